use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::rsvp_field::RsvpFieldDef;

/// Which URL/message encoding the bound template application expects.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateContract {
    #[default]
    ExtendedParams,
    CompactParams,
}

impl TemplateContract {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateContract::ExtendedParams => "extended-params",
            TemplateContract::CompactParams => "compact-params",
        }
    }

    /// Unknown stored values fall back to the extended contract.
    pub fn from_stored(raw: &str) -> Self {
        match raw.trim() {
            "compact-params" | "compact" => TemplateContract::CompactParams,
            _ => TemplateContract::ExtendedParams,
        }
    }
}

impl std::fmt::Display for TemplateContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RsvpType {
    #[default]
    Simple,
    Detailed,
}

/// RSVP behaviour configured by the host for one event.
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RsvpConfig {
    #[serde(rename = "type")]
    pub rsvp_type: RsvpType,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    #[ts(as = "Option<bool>", optional)]
    pub has_custom_fields: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[ts(as = "Option<Vec<RsvpFieldDef>>", optional)]
    pub custom_fields: Vec<RsvpFieldDef>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    #[ts(as = "Option<bool>", optional)]
    pub allow_edit_after_submit: bool,
}

impl RsvpConfig {
    /// Normalize a persisted config column. Anything that is not a well-formed
    /// config object (including NULL, garbage and unknown `type` values)
    /// becomes `{type: "simple"}`.
    pub fn from_stored(raw: Option<&str>) -> Self {
        match raw {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str::<Value>(raw)
                .map(Self::from_value)
                .unwrap_or_default(),
            _ => Self::default(),
        }
    }

    pub fn from_value(value: Value) -> Self {
        match value {
            // Some writers double-encode the column.
            Value::String(inner) => serde_json::from_str::<Value>(&inner)
                .ok()
                .filter(Value::is_object)
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default(),
            Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    /// Whether the guest is expected to fill a custom form after accepting.
    pub fn collects_custom_fields(&self, field_count: usize) -> bool {
        (self.rsvp_type == RsvpType::Detailed || self.has_custom_fields) && field_count > 0
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"simple"}"#.to_string())
    }
}

/// Template-specific bag of invitation content (names, dates, venues,
/// sub-events, family lists, photos, contacts). Reads never fail: a missing
/// or mistyped key is treated as absent.
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq, Default)]
#[serde(transparent)]
pub struct EventDetails(#[ts(type = "Record<string, unknown>")] pub Map<String, Value>);

impl EventDetails {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn from_stored(raw: Option<&str>) -> Self {
        raw.and_then(|raw| serde_json::from_str::<Map<String, Value>>(raw).ok())
            .map(Self)
            .unwrap_or_default()
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Non-empty string (numbers are rendered as strings).
    pub fn text(&self, key: &str) -> Option<String> {
        match self.value(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.value(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> &[Value] {
        match self.value(key) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        }
    }

    pub fn sub_events(&self) -> &[Value] {
        self.list("events")
    }

    pub fn wishes_enabled(&self) -> bool {
        self.flag("wishesEnabled").unwrap_or(true)
    }

    pub fn wishes_auto_approve(&self) -> bool {
        self.flag("wishesAutoApprove").unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub custom_id: Option<String>,
    pub name: String,
    pub details: EventDetails,
    pub rsvp_config: RsvpConfig,
    pub template_contract: TemplateContract,
    pub template_url: Option<String>,
    pub template_is_external: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Event {
    /// Short public id when the host set one, durable id otherwise.
    pub fn public_id(&self) -> String {
        public_id(self.custom_id.as_deref(), self.id)
    }

    fn external_template_url(&self) -> Option<&str> {
        if !self.template_is_external {
            return None;
        }
        self.template_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Base URL of the template deployment this event renders in.
    pub fn template_base_url(&self, default_url: &str) -> String {
        self.external_template_url()
            .unwrap_or(default_url)
            .to_string()
    }

    /// Origin of the event's own external template, when it has one.
    pub fn external_template_origin(&self) -> Option<String> {
        self.external_template_url().and_then(origin_of)
    }
}

pub(crate) fn public_id(custom_id: Option<&str>, id: i64) -> String {
    match custom_id.map(str::trim) {
        Some(custom) if !custom.is_empty() => custom.to_string(),
        _ => id.to_string(),
    }
}

/// ASCII serialization of an absolute URL's origin: lowercased host,
/// punycode for IDNs and no default port. Opaque origins (`data:`,
/// `file:`, relative input) have none.
pub fn origin_of(url: &str) -> Option<String> {
    let origin = url::Url::parse(url.trim()).ok()?.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

#[derive(Debug, Serialize, TS)]
pub struct EventsResponse {
    pub events: Vec<Event>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rsvp_config_defaults_to_simple() {
        assert_eq!(RsvpConfig::from_stored(None).rsvp_type, RsvpType::Simple);
        assert_eq!(RsvpConfig::from_stored(Some("not json")), RsvpConfig::default());
        assert_eq!(RsvpConfig::from_stored(Some("[1,2]")), RsvpConfig::default());
        assert_eq!(
            RsvpConfig::from_stored(Some(r#"{"type":"fancy"}"#)),
            RsvpConfig::default()
        );
        assert_eq!(RsvpConfig::default().to_json_string(), r#"{"type":"simple"}"#);
    }

    #[test]
    fn test_rsvp_config_ts_marks_omitted_fields_optional() {
        let decl = RsvpConfig::decl();
        assert!(decl.contains("hasCustomFields?: boolean"), "{decl}");
        assert!(decl.contains("customFields?: Array<RsvpFieldDef>"), "{decl}");
        assert!(decl.contains("allowEditAfterSubmit?: boolean"), "{decl}");
        assert!(!decl.contains("type?"), "{decl}");
    }

    #[test]
    fn test_rsvp_config_double_encoded() {
        let inner = r#"{"type":"detailed","allowEditAfterSubmit":true}"#;
        let raw = serde_json::to_string(inner).unwrap();
        let config = RsvpConfig::from_stored(Some(&raw));
        assert_eq!(config.rsvp_type, RsvpType::Detailed);
        assert!(config.allow_edit_after_submit);
    }

    #[test]
    fn test_details_read_defensively() {
        let details = EventDetails::new(
            json!({
                "brideName": "Ana",
                "groomName": "",
                "guestCount": 120,
                "events": "not a list",
                "wishesEnabled": "false"
            })
            .as_object()
            .unwrap()
            .clone(),
        );
        assert_eq!(details.text("brideName").as_deref(), Some("Ana"));
        assert_eq!(details.text("groomName"), None);
        assert_eq!(details.text("guestCount").as_deref(), Some("120"));
        assert_eq!(details.text("missing"), None);
        assert!(details.sub_events().is_empty());
        assert!(!details.wishes_enabled());
        assert!(EventDetails::default().wishes_enabled());
    }

    #[test]
    fn test_origin_of() {
        assert_eq!(
            origin_of("https://Templates.Example.com/wedding/?a=1").as_deref(),
            Some("https://templates.example.com")
        );
        assert_eq!(
            origin_of("http://localhost:5173").as_deref(),
            Some("http://localhost:5173")
        );
        assert_eq!(origin_of("/relative/path"), None);
        assert_eq!(origin_of("data:text/html,hi"), None);
        assert_eq!(origin_of("null"), None);
    }

    #[test]
    fn test_origin_of_drops_default_port() {
        assert_eq!(
            origin_of("https://t.example.com:443/w").as_deref(),
            Some("https://t.example.com")
        );
        assert_eq!(
            origin_of("http://t.example.com:80").as_deref(),
            Some("http://t.example.com")
        );
        assert_eq!(
            origin_of("https://t.example.com:8443").as_deref(),
            Some("https://t.example.com:8443")
        );
        assert_eq!(
            origin_of("https://user:pw@T.Example.com/").as_deref(),
            Some("https://t.example.com")
        );
    }

    #[test]
    fn test_template_base_url_resolution() {
        let mut event = Event {
            id: 7,
            custom_id: None,
            name: "E".to_string(),
            details: EventDetails::default(),
            rsvp_config: RsvpConfig::default(),
            template_contract: TemplateContract::ExtendedParams,
            template_url: Some("https://custom.example.org/t".to_string()),
            template_is_external: false,
            created_at: 0,
            updated_at: 0,
        };
        assert_eq!(event.template_base_url("https://default.example"), "https://default.example");
        assert_eq!(event.external_template_origin(), None);

        event.template_is_external = true;
        assert_eq!(event.template_base_url("https://default.example"), "https://custom.example.org/t");
        assert_eq!(
            event.external_template_origin().as_deref(),
            Some("https://custom.example.org")
        );
        assert_eq!(event.public_id(), "7");
    }
}
