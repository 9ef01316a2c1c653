use actix_web::{web, HttpRequest, HttpResponse};
use shared_types::{
    BusOutcomeResponse, InboundEnvelope, OpenFrameRequest, OpenFrameResponse, OutboxResponse,
    ReloadResponse,
};

use super::invitations::{invitation_url, resolve_invitation, InvitationError};
use super::InvitationAppState;
use crate::helpers::frame_sessions::ReloadError;
use crate::protocol::{BusOutcome, FrameContext, FrameOptions};

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Frame session not found")]
    SessionNotFound,
    #[error(transparent)]
    Invitation(#[from] InvitationError),
    #[error("Template failed to load after {0} attempts")]
    ReloadLimit(u32),
    #[error("Page origin {0} is not a configured host page")]
    UntrustedPageOrigin(String),
    #[error("Admin frame sessions need a valid admin token")]
    AdminNotAuthorized,
}

pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

impl From<ReloadError> for FrameError {
    fn from(e: ReloadError) -> Self {
        match e {
            ReloadError::NotFound => FrameError::SessionNotFound,
            ReloadError::LimitReached(max) => FrameError::ReloadLimit(max),
        }
    }
}

impl actix_web::error::ResponseError for FrameError {
    fn error_response(&self) -> HttpResponse {
        match self {
            FrameError::SessionNotFound => {
                HttpResponse::NotFound().json(serde_json::json!({ "error": self.to_string() }))
            }
            FrameError::Invitation(e) => e.error_response(),
            FrameError::ReloadLimit(_) => {
                HttpResponse::TooManyRequests().json(serde_json::json!({ "error": self.to_string() }))
            }
            FrameError::UntrustedPageOrigin(_) => {
                HttpResponse::BadRequest().json(serde_json::json!({ "error": self.to_string() }))
            }
            FrameError::AdminNotAuthorized => {
                HttpResponse::Forbidden().json(serde_json::json!({ "error": self.to_string() }))
            }
        }
    }
}

impl From<BusOutcome> for BusOutcomeResponse {
    fn from(outcome: BusOutcome) -> Self {
        match outcome {
            BusOutcome::Handled => BusOutcomeResponse::Handled,
            BusOutcome::Ignored(reason) => BusOutcomeResponse::Ignored { reason },
            BusOutcome::Failed(error) => BusOutcomeResponse::Error { error },
        }
    }
}

/// Mount: resolve the invitation and open a frame session for it.
pub async fn open_frame(
    http: HttpRequest,
    state: web::Data<InvitationAppState>,
    request: web::Json<OpenFrameRequest>,
) -> Result<HttpResponse, FrameError> {
    let req = request.into_inner();

    if req.admin {
        let token = http
            .headers()
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if !state.channel.admits_admin(token) {
            tracing::warn!("Refused admin frame session for {}/{}", req.event_ref, req.guest_ref);
            return Err(FrameError::AdminNotAuthorized);
        }
    }
    let page_origin = state
        .channel
        .page_origin_for(req.page_origin.as_deref())
        .ok_or_else(|| FrameError::UntrustedPageOrigin(req.page_origin.clone().unwrap_or_default()))?;

    let (event, guest) = resolve_invitation(state.store(), &req.event_ref, &req.guest_ref).await?;
    let is_preview = req.preview || req.hero_preview;
    let url = invitation_url(&state, &event, &guest, req.preview, req.hero_preview).await?;

    let context = FrameContext::new(
        &event,
        &guest,
        &FrameOptions {
            page_origin: &page_origin,
            known_template_origins: &state.templates.known_origins,
            default_template_url: &state.templates.default_url,
            dev_mode: state.channel.dev_mode,
            is_preview,
            is_admin: req.admin,
        },
    );
    let target_origin = context.target_origin.clone();
    let session_id = state.sessions.open(context, url.clone()).await;

    Ok(HttpResponse::Created().json(OpenFrameResponse {
        session_id,
        invitation_url: url,
        target_origin,
    }))
}

/// The iframe fired its native load event.
pub async fn frame_loaded(
    state: web::Data<InvitationAppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, FrameError> {
    let session_id = path.into_inner();
    if !state.sessions.start_delivery(&session_id, state.bus.clone()).await {
        return Err(FrameError::SessionNotFound);
    }
    Ok(HttpResponse::Accepted().finish())
}

pub async fn post_message(
    state: web::Data<InvitationAppState>,
    path: web::Path<String>,
    envelope: web::Json<InboundEnvelope>,
) -> Result<HttpResponse, FrameError> {
    let session_id = path.into_inner();
    let (context, channel) = state
        .sessions
        .get(&session_id)
        .await
        .ok_or(FrameError::SessionNotFound)?;

    let outcome = state
        .bus
        .handle_inbound(&context, channel.as_ref(), &envelope.origin, &envelope.message)
        .await;

    Ok(HttpResponse::Ok().json(BusOutcomeResponse::from(outcome)))
}

pub async fn drain_outbox(
    state: web::Data<InvitationAppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, FrameError> {
    let messages = state
        .sessions
        .drain(&path.into_inner())
        .await
        .ok_or(FrameError::SessionNotFound)?;
    Ok(HttpResponse::Ok().json(OutboxResponse { messages }))
}

/// Manual retry after the template failed to load.
pub async fn reload_frame(
    state: web::Data<InvitationAppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, FrameError> {
    let (attempt, invitation_url) = state.sessions.register_reload(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ReloadResponse {
        attempt,
        max_attempts: state.sessions.max_reloads(),
        invitation_url,
    }))
}

/// Unmount: detach the channel and abort pending deliveries.
pub async fn close_frame(
    state: web::Data<InvitationAppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, FrameError> {
    if !state.sessions.close(&path.into_inner()).await {
        return Err(FrameError::SessionNotFound);
    }
    Ok(HttpResponse::NoContent().finish())
}
