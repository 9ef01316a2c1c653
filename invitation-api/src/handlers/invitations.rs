use actix_web::{web, HttpResponse};
use serde::Deserialize;
use shared_types::{Event, Guest, GuestAccessGrid, InvitationLinkResponse};

use super::InvitationAppState;
use crate::database::InvitationStore;
use crate::protocol::{build_invitation_url, UrlExtras};

#[derive(Debug, thiserror::Error)]
pub enum InvitationError {
    #[error("Invitation not found")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl actix_web::error::ResponseError for InvitationError {
    fn error_response(&self) -> HttpResponse {
        match self {
            InvitationError::NotFound => {
                HttpResponse::NotFound().json(serde_json::json!({ "error": "Invitation not found" }))
            }
            InvitationError::Internal(e) => {
                tracing::error!("Invitation lookup failed: {}", e);
                HttpResponse::InternalServerError().json(serde_json::json!({ "error": e.to_string() }))
            }
        }
    }
}

/// Resolves an invitation link. Both parts accept public or durable ids.
pub(crate) async fn resolve_invitation(
    store: &dyn InvitationStore,
    event_ref: &str,
    guest_ref: &str,
) -> Result<(Event, Guest), InvitationError> {
    let event = store
        .find_event(event_ref)
        .await?
        .ok_or(InvitationError::NotFound)?;
    let guest = store
        .find_guest(event.id, guest_ref)
        .await?
        .ok_or(InvitationError::NotFound)?;
    Ok((event, guest))
}

/// The iframe URL for this guest, with access-filtered sub-events and the
/// approved wishes.
pub(crate) async fn invitation_url(
    state: &InvitationAppState,
    event: &Event,
    guest: &Guest,
    preview: bool,
    hero_preview: bool,
) -> Result<String, InvitationError> {
    let store = state.store();
    let rows = store.list_guest_access(guest.id, event.id).await?;
    let access = GuestAccessGrid::from_rows(&rows);
    let wishes = if event.details.wishes_enabled() {
        store.list_wishes(event.id, true).await?
    } else {
        Vec::new()
    };

    let base_url = event.template_base_url(&state.templates.default_url);
    let extras = UrlExtras {
        access: Some(&access),
        wishes: &wishes,
        preview,
        hero_preview,
        params: Vec::new(),
    };
    Ok(build_invitation_url(&base_url, Some(event), Some(guest), &extras))
}

#[derive(Deserialize)]
pub struct LinkQuery {
    #[serde(default)]
    preview: bool,
    #[serde(default)]
    hero_preview: bool,
}

pub async fn get_invitation_link(
    state: web::Data<InvitationAppState>,
    path: web::Path<(String, String)>,
    query: web::Query<LinkQuery>,
) -> Result<HttpResponse, InvitationError> {
    let (event_ref, guest_ref) = path.into_inner();
    let (event, guest) = resolve_invitation(state.store(), &event_ref, &guest_ref).await?;

    let invitation_url = invitation_url(&state, &event, &guest, query.preview, query.hero_preview).await?;

    Ok(HttpResponse::Ok().json(InvitationLinkResponse {
        event_id: event.public_id(),
        guest_id: guest.public_id(),
        guest_status: guest.status(),
        template_base_url: event.template_base_url(&state.templates.default_url),
        invitation_url,
    }))
}
