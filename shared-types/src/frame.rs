//! Request/response bodies for the host bridge that relays frame traffic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::guest::GuestStatus;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct InvitationLinkResponse {
    pub event_id: String,
    pub guest_id: String,
    pub guest_status: GuestStatus,
    pub template_base_url: String,
    pub invitation_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct OpenFrameRequest {
    pub event_ref: String,
    pub guest_ref: String,
    /// Origin of the host page embedding the frame.
    pub page_origin: Option<String>,
    #[serde(default)]
    pub preview: bool,
    #[serde(default)]
    pub hero_preview: bool,
    /// Host-side preview with moderation rights over the wish wall.
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct OpenFrameResponse {
    pub session_id: String,
    pub invitation_url: String,
    pub target_origin: String,
}

/// A raw `message` event captured by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct InboundEnvelope {
    pub origin: String,
    #[ts(type = "unknown")]
    pub message: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum BusOutcomeResponse {
    Handled,
    Ignored { reason: String },
    Error { error: String },
}

/// An outbound message plus the exact origin it must be posted to.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMessage {
    pub target_origin: String,
    #[ts(type = "{ type: string, data: unknown, timestamp: number }")]
    pub message: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct OutboxResponse {
    pub messages: Vec<QueuedMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ReloadResponse {
    pub attempt: u32,
    pub max_attempts: u32,
    pub invitation_url: String,
}
