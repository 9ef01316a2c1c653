use crate::database::InvitationStore;
use async_trait::async_trait;
use serde_json::{Map, Value};
use shared_types::{InboundKind, NewWish, NewWishReply, PayloadUpdate, Wish};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum WishError {
    #[error("Event {0} not found")]
    EventNotFound(i64),
    #[error("Wishes are disabled for this event")]
    Disabled,
    #[error("Only the host can {0}")]
    Forbidden(&'static str),
    #[error("Invalid wish payload: {0}")]
    InvalidPayload(String),
    #[error("Wish {0} not found")]
    WishNotFound(i64),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Who is acting on the wish wall of which event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WishContext {
    pub event_id: i64,
    pub event_public_id: String,
    pub guest_id: Option<i64>,
    /// Stable key for per-guest likes.
    pub liker_key: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WishRequest {
    Initial,
    InitialAdmin,
    Refresh,
    Submit {
        guest_name: String,
        content: String,
        image_url: Option<String>,
    },
    Approve(i64),
    Delete(i64),
    ToggleLike {
        wish_id: i64,
        liker_key: Option<String>,
    },
    Reply {
        wish_id: i64,
        author_name: String,
        content: String,
    },
}

impl WishRequest {
    /// Reads a wish-family message. `fields` is the merged `data`/`payload`
    /// object, already carrying the session's guest id and name.
    pub fn parse(kind: InboundKind, fields: &Map<String, Value>) -> Result<Self, WishError> {
        let request = match kind {
            InboundKind::RequestInitialWishes => WishRequest::Initial,
            InboundKind::RequestInitialAdminWishes => WishRequest::InitialAdmin,
            InboundKind::RequestWishesRefresh => WishRequest::Refresh,
            InboundKind::SubmitNewWish => WishRequest::Submit {
                guest_name: text(fields, &["guestName", "name"])
                    .ok_or_else(|| WishError::InvalidPayload("missing guest name".to_string()))?,
                content: text(fields, &["content", "message"])
                    .ok_or_else(|| WishError::InvalidPayload("missing content".to_string()))?,
                image_url: text(fields, &["imageUrl", "image"]),
            },
            InboundKind::ApproveWish => WishRequest::Approve(wish_id(fields)?),
            InboundKind::DeleteWish => WishRequest::Delete(wish_id(fields)?),
            InboundKind::ToggleWishLike => WishRequest::ToggleLike {
                wish_id: wish_id(fields)?,
                liker_key: text(fields, &["likerKey", "guestId"]),
            },
            InboundKind::SubmitWishReply => WishRequest::Reply {
                wish_id: wish_id(fields)?,
                author_name: text(fields, &["authorName", "guestName", "name"])
                    .ok_or_else(|| WishError::InvalidPayload("missing author name".to_string()))?,
                content: text(fields, &["content", "message", "reply"])
                    .ok_or_else(|| WishError::InvalidPayload("missing content".to_string()))?,
            },
            other => {
                return Err(WishError::InvalidPayload(format!("{} is not a wish message", other)));
            }
        };
        Ok(request)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WishRequest::Initial => "initial",
            WishRequest::InitialAdmin => "initial-admin",
            WishRequest::Refresh => "refresh",
            WishRequest::Submit { .. } => "submit",
            WishRequest::Approve(_) => "approve",
            WishRequest::Delete(_) => "delete",
            WishRequest::ToggleLike { .. } => "toggle-like",
            WishRequest::Reply { .. } => "reply",
        }
    }
}

fn text(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match fields.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn wish_id(fields: &Map<String, Value>) -> Result<i64, WishError> {
    let raw = fields.get("wishId").or_else(|| fields.get("id"));
    match raw {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| WishError::InvalidPayload("missing or invalid wish id".to_string()))
}

#[async_trait]
pub trait WishHandler: Send + Sync {
    /// Applies the request and returns the wish list the caller should see.
    async fn handle(&self, ctx: &WishContext, request: WishRequest) -> Result<PayloadUpdate, WishError>;
}

#[derive(Clone)]
pub struct WishService {
    store: Arc<dyn InvitationStore>,
}

impl WishService {
    pub fn new(store: Arc<dyn InvitationStore>) -> Self {
        Self { store }
    }

    async fn payload(&self, ctx: &WishContext, admin_view: bool) -> Result<PayloadUpdate, WishError> {
        let wishes: Vec<Wish> = self.store.list_wishes(ctx.event_id, !admin_view).await?;
        Ok(PayloadUpdate {
            event_id: ctx.event_public_id.clone(),
            wishes,
            is_admin_view: admin_view,
        })
    }

    fn require_admin(ctx: &WishContext, action: &'static str) -> Result<(), WishError> {
        if ctx.is_admin {
            Ok(())
        } else {
            tracing::warn!("Guest session tried to {} on event {}", action, ctx.event_id);
            Err(WishError::Forbidden(action))
        }
    }
}

#[async_trait]
impl WishHandler for WishService {
    async fn handle(&self, ctx: &WishContext, request: WishRequest) -> Result<PayloadUpdate, WishError> {
        let event = self
            .store
            .get_event(ctx.event_id)
            .await?
            .ok_or(WishError::EventNotFound(ctx.event_id))?;
        if !event.details.wishes_enabled() && !ctx.is_admin {
            return Err(WishError::Disabled);
        }

        tracing::debug!("Wish {} on event {}", request.name(), ctx.event_id);

        match request {
            WishRequest::Initial | WishRequest::Refresh => self.payload(ctx, false).await,
            WishRequest::InitialAdmin => {
                Self::require_admin(ctx, "list all wishes")?;
                self.payload(ctx, true).await
            }
            WishRequest::Submit {
                guest_name,
                content,
                image_url,
            } => {
                let approved = ctx.is_admin || event.details.wishes_auto_approve();
                let new_wish = NewWish {
                    guest_id: ctx.guest_id,
                    guest_name,
                    content,
                    image_url,
                };
                let id = self.store.insert_wish(ctx.event_id, &new_wish, approved).await?;
                tracing::info!(
                    "Wish {} submitted on event {} ({})",
                    id,
                    ctx.event_id,
                    if approved { "approved" } else { "awaiting approval" }
                );
                self.payload(ctx, ctx.is_admin).await
            }
            WishRequest::Approve(wish_id) => {
                Self::require_admin(ctx, "approve wishes")?;
                if !self.store.approve_wish(ctx.event_id, wish_id).await? {
                    return Err(WishError::WishNotFound(wish_id));
                }
                tracing::info!("Wish {} approved on event {}", wish_id, ctx.event_id);
                self.payload(ctx, true).await
            }
            WishRequest::Delete(wish_id) => {
                Self::require_admin(ctx, "delete wishes")?;
                if !self.store.delete_wish(ctx.event_id, wish_id).await? {
                    return Err(WishError::WishNotFound(wish_id));
                }
                tracing::info!("Wish {} deleted from event {}", wish_id, ctx.event_id);
                self.payload(ctx, true).await
            }
            WishRequest::ToggleLike { wish_id, liker_key } => {
                let liker_key = ctx
                    .liker_key
                    .clone()
                    .or(liker_key)
                    .ok_or_else(|| WishError::InvalidPayload("no liker to attribute the like to".to_string()))?;
                self.store
                    .toggle_wish_like(ctx.event_id, wish_id, &liker_key)
                    .await?
                    .ok_or(WishError::WishNotFound(wish_id))?;
                self.payload(ctx, ctx.is_admin).await
            }
            WishRequest::Reply {
                wish_id,
                author_name,
                content,
            } => {
                let reply = NewWishReply {
                    wish_id,
                    guest_id: ctx.guest_id,
                    author_name,
                    content,
                };
                self.store
                    .insert_wish_reply(ctx.event_id, &reply)
                    .await?
                    .ok_or(WishError::WishNotFound(wish_id))?;
                self.payload(ctx, ctx.is_admin).await
            }
        }
    }
}
