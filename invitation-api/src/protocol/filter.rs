//! Screening of raw `message` events before any business logic runs.
//!
//! The window listener receives traffic from every script on the page, so a
//! message must pass three stages: object shape with a string `type`, a
//! deny-list of extension/dev-tool noise, and the allow-list of known types.

use serde_json::{Map, Value};
use shared_types::{InboundKind, InboundMessage};

/// Fields whose mere presence identifies a third-party broadcast.
const NOISE_MARKER_FIELDS: &[&str] = &[
    "posdMessageId",
    "wappalyzer",
    "__grammarly",
    "__REACT_DEVTOOLS_GLOBAL_HOOK__",
    "isAngularDevTools",
];

/// Prefixes of `source`/`target` values used by extensions and dev tools.
const NOISE_SOURCE_PREFIXES: &[&str] = &[
    "react-devtools",
    "vue-devtools",
    "@devtools",
    "metamask",
    "ethereum-provider",
    "redux-devtools",
];

/// Prefixes of `type` values used by bundler dev servers.
const NOISE_TYPE_PREFIXES: &[&str] = &["webpack", "vite:", "parcel:", "__"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterRejection {
    #[error("message is not an object")]
    NotAnObject,
    #[error("message has no string `type` field")]
    MissingType,
    #[error("third-party noise ({0})")]
    Noise(String),
    #[error("unknown message type `{0}`")]
    UnknownType(String),
}

pub fn screen(raw: &Value) -> Result<InboundMessage, FilterRejection> {
    // Stage 1: shape
    let Value::Object(fields) = raw else {
        return Err(FilterRejection::NotAnObject);
    };
    let Some(type_name) = fields.get("type").and_then(Value::as_str) else {
        return Err(FilterRejection::MissingType);
    };

    // Stage 2: deny-list
    if let Some(marker) = noise_marker(fields, type_name) {
        return Err(FilterRejection::Noise(marker));
    }

    // Stage 3: allow-list
    let kind = InboundKind::from_type(type_name)
        .ok_or_else(|| FilterRejection::UnknownType(type_name.to_string()))?;

    Ok(InboundMessage {
        kind,
        data: fields.get("data").filter(|v| !v.is_null()).cloned(),
        payload: fields.get("payload").filter(|v| !v.is_null()).cloned(),
    })
}

fn noise_marker(fields: &Map<String, Value>, type_name: &str) -> Option<String> {
    if let Some(field) = NOISE_MARKER_FIELDS.iter().find(|f| fields.contains_key(**f)) {
        return Some((*field).to_string());
    }

    for key in ["source", "target"] {
        if let Some(value) = fields.get(key).and_then(Value::as_str) {
            if NOISE_SOURCE_PREFIXES.iter().any(|p| value.starts_with(p)) {
                return Some(format!("{key}={value}"));
            }
        }
    }

    NOISE_TYPE_PREFIXES
        .iter()
        .any(|p| type_name.starts_with(p))
        .then(|| format!("type={type_name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_malformed_and_unknown() {
        assert_eq!(screen(&json!({})), Err(FilterRejection::MissingType));
        assert_eq!(screen(&json!({"type": 123})), Err(FilterRejection::MissingType));
        assert_eq!(screen(&json!("TEMPLATE_READY")), Err(FilterRejection::NotAnObject));
        assert_eq!(screen(&json!(null)), Err(FilterRejection::NotAnObject));
        assert!(screen(&json!({"posdMessageId": "PANELOS_MESSAGE"})).is_err());
        assert_eq!(
            screen(&json!({"type": "NOT_A_REAL_TYPE"})),
            Err(FilterRejection::UnknownType("NOT_A_REAL_TYPE".to_string()))
        );
    }

    #[test]
    fn test_rejects_noise_even_with_known_type() {
        let extension = json!({"type": "TEMPLATE_READY", "posdMessageId": "PANELOS_MESSAGE"});
        assert_eq!(
            screen(&extension),
            Err(FilterRejection::Noise("posdMessageId".to_string()))
        );

        let devtools = json!({"type": "STATUS_UPDATE", "source": "react-devtools-bridge"});
        assert!(matches!(screen(&devtools), Err(FilterRejection::Noise(_))));

        let hmr = json!({"type": "webpackHotUpdate"});
        assert!(matches!(screen(&hmr), Err(FilterRejection::Noise(_))));
    }

    #[test]
    fn test_accepts_known_types() {
        let ready = screen(&json!({"type": "TEMPLATE_READY"})).unwrap();
        assert_eq!(ready.kind, InboundKind::TemplateReady);
        assert_eq!(ready.data, None);

        let wish = screen(&json!({
            "type": "SUBMIT_NEW_WISH",
            "payload": {"content": "Congratulations!"}
        }))
        .unwrap();
        assert_eq!(wish.kind, InboundKind::SubmitNewWish);
        assert_eq!(wish.payload, Some(json!({"content": "Congratulations!"})));
    }

    #[test]
    fn test_template_source_field_is_not_noise() {
        let msg = json!({"type": "GUEST_ACCEPTED", "source": "wedding-template"});
        assert!(screen(&msg).is_ok());
    }
}
