//! Message contract between the host page and the embedded template frame.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::access::SubEventAccess;
use crate::guest::{ButtonFlags, GuestStatus, RsvpData};
use crate::rsvp_field::RsvpFieldDef;
use crate::wish::Wish;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFamily {
    Rsvp,
    Wish,
}

/// Every message type a template may send to the host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundKind {
    TemplateReady,
    GuestAccepted,
    RsvpSubmitted,
    RsvpUpdated,
    InvitationViewed,
    StatusUpdate,
    RequestInitialWishes,
    RequestInitialAdminWishes,
    SubmitNewWish,
    ApproveWish,
    DeleteWish,
    ToggleWishLike,
    RequestWishesRefresh,
    SubmitWishReply,
}

impl InboundKind {
    pub const ALL: [InboundKind; 14] = [
        InboundKind::TemplateReady,
        InboundKind::GuestAccepted,
        InboundKind::RsvpSubmitted,
        InboundKind::RsvpUpdated,
        InboundKind::InvitationViewed,
        InboundKind::StatusUpdate,
        InboundKind::RequestInitialWishes,
        InboundKind::RequestInitialAdminWishes,
        InboundKind::SubmitNewWish,
        InboundKind::ApproveWish,
        InboundKind::DeleteWish,
        InboundKind::ToggleWishLike,
        InboundKind::RequestWishesRefresh,
        InboundKind::SubmitWishReply,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InboundKind::TemplateReady => "TEMPLATE_READY",
            InboundKind::GuestAccepted => "GUEST_ACCEPTED",
            InboundKind::RsvpSubmitted => "RSVP_SUBMITTED",
            InboundKind::RsvpUpdated => "RSVP_UPDATED",
            InboundKind::InvitationViewed => "INVITATION_VIEWED",
            InboundKind::StatusUpdate => "STATUS_UPDATE",
            InboundKind::RequestInitialWishes => "REQUEST_INITIAL_WISHES",
            InboundKind::RequestInitialAdminWishes => "REQUEST_INITIAL_ADMIN_WISHES",
            InboundKind::SubmitNewWish => "SUBMIT_NEW_WISH",
            InboundKind::ApproveWish => "APPROVE_WISH",
            InboundKind::DeleteWish => "DELETE_WISH",
            InboundKind::ToggleWishLike => "TOGGLE_WISH_LIKE",
            InboundKind::RequestWishesRefresh => "REQUEST_WISHES_REFRESH",
            InboundKind::SubmitWishReply => "SUBMIT_WISH_REPLY",
        }
    }

    /// Exact, case-sensitive lookup against the allow-list.
    pub fn from_type(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }

    pub fn family(&self) -> MessageFamily {
        match self {
            InboundKind::TemplateReady
            | InboundKind::GuestAccepted
            | InboundKind::RsvpSubmitted
            | InboundKind::RsvpUpdated
            | InboundKind::InvitationViewed
            | InboundKind::StatusUpdate => MessageFamily::Rsvp,
            InboundKind::RequestInitialWishes
            | InboundKind::RequestInitialAdminWishes
            | InboundKind::SubmitNewWish
            | InboundKind::ApproveWish
            | InboundKind::DeleteWish
            | InboundKind::ToggleWishLike
            | InboundKind::RequestWishesRefresh
            | InboundKind::SubmitWishReply => MessageFamily::Wish,
        }
    }
}

impl std::fmt::Display for InboundKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An inbound message that passed shape, noise and allow-list screening.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub kind: InboundKind,
    pub data: Option<Value>,
    pub payload: Option<Value>,
}

impl InboundMessage {
    pub fn new(kind: InboundKind) -> Self {
        Self {
            kind,
            data: None,
            payload: None,
        }
    }

    /// Object fields of `data` and `payload` merged, `payload` winning.
    pub fn merged_fields(&self) -> Map<String, Value> {
        let mut merged = Map::new();
        for part in [&self.data, &self.payload].into_iter().flatten() {
            if let Value::Object(fields) = part {
                for (key, value) in fields {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        merged
    }
}

/// Host → template message body, tagged by its `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundPayload {
    InvitationLoaded(InvitationLoaded),
    StatusUpdate(StatusUpdate),
    InvitationPayloadUpdate(PayloadUpdate),
}

impl OutboundPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundPayload::InvitationLoaded(_) => "INVITATION_LOADED",
            OutboundPayload::StatusUpdate(_) => "STATUS_UPDATE",
            OutboundPayload::InvitationPayloadUpdate(_) => "INVITATION_PAYLOAD_UPDATE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundMessage {
    #[serde(flatten)]
    pub payload: OutboundPayload,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl OutboundMessage {
    pub fn new(payload: OutboundPayload) -> Self {
        Self {
            payload,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.payload.type_name()
    }
}

/// Everything a template needs to render one guest's invitation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvitationLoaded {
    pub event_id: String,
    pub guest_id: String,
    pub guest_name: String,
    /// `null` until the guest has accepted.
    pub status: Option<GuestStatus>,
    pub guest_status: GuestStatus,
    #[serde(flatten)]
    pub buttons: ButtonFlags,
    pub rsvp_fields: Vec<RsvpFieldDef>,
    #[ts(type = "Record<string, unknown> | null")]
    pub existing_rsvp_data: Option<RsvpData>,
    pub wishes_enabled: bool,
    pub wishes: Vec<Wish>,
    #[ts(type = "Record<string, unknown>")]
    pub event_details: Value,
    pub guest_access: Vec<SubEventAccess>,
    pub is_preview: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub event_id: String,
    pub guest_id: String,
    pub status: Option<GuestStatus>,
    pub guest_status: GuestStatus,
    #[serde(flatten)]
    pub buttons: ButtonFlags,
    #[ts(type = "Record<string, unknown> | null")]
    pub existing_rsvp_data: Option<RsvpData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PayloadUpdate {
    pub event_id: String,
    pub wishes: Vec<Wish>,
    pub is_admin_view: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_lookup_is_exact() {
        assert_eq!(InboundKind::from_type("TEMPLATE_READY"), Some(InboundKind::TemplateReady));
        assert_eq!(InboundKind::from_type("template_ready"), None);
        assert_eq!(InboundKind::from_type("NOT_A_REAL_TYPE"), None);
        for kind in InboundKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, json!(kind.as_str()));
        }
    }

    #[test]
    fn test_families() {
        assert_eq!(InboundKind::StatusUpdate.family(), MessageFamily::Rsvp);
        assert_eq!(InboundKind::SubmitWishReply.family(), MessageFamily::Wish);
        let rsvp = InboundKind::ALL
            .iter()
            .filter(|k| k.family() == MessageFamily::Rsvp)
            .count();
        assert_eq!(rsvp, 6);
    }

    #[test]
    fn test_merged_fields_payload_wins() {
        let message = InboundMessage {
            kind: InboundKind::RsvpSubmitted,
            data: Some(json!({"meal": "fish", "note": "hi"})),
            payload: Some(json!({"meal": "veg"})),
        };
        let merged = message.merged_fields();
        assert_eq!(merged["meal"], json!("veg"));
        assert_eq!(merged["note"], json!("hi"));
    }

    #[test]
    fn test_outbound_envelope_shape() {
        let message = OutboundMessage {
            payload: OutboundPayload::StatusUpdate(StatusUpdate {
                event_id: "e1".to_string(),
                guest_id: "g1".to_string(),
                status: Some(GuestStatus::Accepted),
                guest_status: GuestStatus::Accepted,
                buttons: ButtonFlags {
                    show_accept_button: false,
                    show_submit_button: true,
                    show_edit_button: false,
                },
                existing_rsvp_data: None,
            }),
            timestamp: 42,
        };

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], json!("STATUS_UPDATE"));
        assert_eq!(value["timestamp"], json!(42));
        assert_eq!(value["data"]["status"], json!("accepted"));
        assert_eq!(value["data"]["showSubmitButton"], json!(true));
        assert_eq!(value["data"]["existingRsvpData"], Value::Null);
    }
}
