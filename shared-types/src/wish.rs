use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Placeholder sent instead of image data wherever size matters (URLs).
pub const HAS_IMAGE_MARKER: &str = "HAS_IMAGE";

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Wish {
    pub id: i64,
    pub event_id: i64,
    pub guest_id: Option<i64>,
    pub guest_name: String,
    pub content: String,
    pub image_url: Option<String>,
    pub likes_count: i64,
    pub is_approved: bool,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[ts(as = "Option<Vec<WishReply>>", optional)]
    pub replies: Vec<WishReply>,
}

impl Wish {
    /// Copy safe to embed in a URL: image data replaced by a marker.
    pub fn without_image_data(&self) -> Wish {
        Wish {
            image_url: self.image_url.as_ref().map(|_| HAS_IMAGE_MARKER.to_string()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WishReply {
    pub id: i64,
    pub wish_id: i64,
    pub guest_id: Option<i64>,
    pub author_name: String,
    pub content: String,
    pub created_at: i64,
}

/// A wish as submitted by a template, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewWish {
    pub guest_id: Option<i64>,
    pub guest_name: String,
    pub content: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewWishReply {
    pub wish_id: i64,
    pub guest_id: Option<i64>,
    pub author_name: String,
    pub content: String,
}
