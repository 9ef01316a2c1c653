use actix_web::{web, HttpResponse};
use shared_types::{GuestAccessResponse, SetAccessRequest};

use super::InvitationAppState;
use crate::database::guests;
use crate::protocol::{AccessError, AccessMatrix};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AccessHandlerError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Internal(String),
}

impl From<AccessError> for AccessHandlerError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::EventNotFound(_) => AccessHandlerError::NotFound(e.to_string()),
            AccessError::InvalidIndex(_) => AccessHandlerError::Validation(e.to_string()),
            AccessError::Store(e) => AccessHandlerError::Internal(e.to_string()),
        }
    }
}

impl actix_web::error::ResponseError for AccessHandlerError {
    fn error_response(&self) -> HttpResponse {
        let body = serde_json::json!({ "error": self.to_string() });
        match self {
            AccessHandlerError::NotFound(_) => HttpResponse::NotFound().json(body),
            AccessHandlerError::Validation(_) => HttpResponse::BadRequest().json(body),
            AccessHandlerError::Internal(msg) => {
                tracing::error!("Access matrix operation failed: {}", msg);
                HttpResponse::InternalServerError().json(body)
            }
        }
    }
}

fn matrix(state: &InvitationAppState) -> AccessMatrix {
    AccessMatrix::new(Arc::new(state.db.clone()))
}

pub async fn get_guest_access(
    state: web::Data<InvitationAppState>,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, AccessHandlerError> {
    let (event_id, guest_id) = path.into_inner();

    let guest = state
        .store()
        .get_guest(guest_id)
        .await
        .map_err(|e| AccessHandlerError::Internal(e.to_string()))?
        .filter(|g| g.event_id == event_id)
        .ok_or_else(|| AccessHandlerError::NotFound("Guest not found".to_string()))?;

    let access = matrix(&state).describe(guest.id, event_id).await?;

    Ok(HttpResponse::Ok().json(GuestAccessResponse {
        guest_id,
        event_id,
        access,
    }))
}

/// Bulk update: one sub-event when an index is given, all of them otherwise.
pub async fn set_event_access(
    state: web::Data<InvitationAppState>,
    path: web::Path<i64>,
    request: web::Json<SetAccessRequest>,
) -> Result<HttpResponse, AccessHandlerError> {
    let event_id = path.into_inner();
    let req = request.into_inner();

    if req.guest_ids.is_empty() {
        return Err(AccessHandlerError::Validation("guestIds cannot be empty".to_string()));
    }

    let event_guests = guests::list_guest_ids(state.db.clone(), event_id)
        .await
        .map_err(|e| AccessHandlerError::Internal(e.to_string()))?;
    let foreign: Vec<String> = req
        .guest_ids
        .iter()
        .filter(|id| !event_guests.contains(id))
        .map(i64::to_string)
        .collect();
    if !foreign.is_empty() {
        return Err(AccessHandlerError::Validation(format!(
            "Guests {} do not belong to event {}",
            foreign.join(", "),
            event_id
        )));
    }

    let matrix = matrix(&state);
    let updated = match req.event_detail_index.as_deref() {
        Some(index) => {
            matrix
                .set_access(event_id, &req.guest_ids, index, req.can_access)
                .await?
        }
        None => {
            matrix
                .set_access_for_all_details(event_id, &req.guest_ids, req.can_access)
                .await?
        }
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({ "updated": updated })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChannelConfig, TemplatesConfig};
    use crate::database::test_support::{seed_wedding, temp_database};
    use crate::database::{events, InvitationStore};
    use actix_web::{test, App};
    use serde_json::{json, Value};
    use shared_types::{RsvpConfig, TemplateContract};

    #[actix_web::test]
    async fn test_access_update_is_scoped_to_event_guests() {
        let (_dir, conn) = temp_database();
        let seeded = seed_wedding(&conn).await;
        let other_event = events::insert_event(
            conn.clone(),
            events::NewEvent {
                custom_id: Some("E2".to_string()),
                name: "Other wedding".to_string(),
                details: Default::default(),
                rsvp_config: RsvpConfig::default(),
                template_contract: TemplateContract::ExtendedParams,
                template_url: None,
                template_is_external: false,
            },
        )
        .await
        .unwrap();
        let outsider = guests::insert_guest(conn.clone(), other_event, "Outsider", None)
            .await
            .unwrap();

        let state = InvitationAppState::new(conn.clone(), TemplatesConfig::default(), ChannelConfig::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/api/events/{id}/access", web::put().to(set_event_access)),
        )
        .await;
        let uri = format!("/api/events/{}/access", seeded.event_id);

        let req = test::TestRequest::put()
            .uri(&uri)
            .set_json(json!({"guestIds": [seeded.guest_id, outsider], "eventDetailIndex": "0", "canAccess": false}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
        assert!(conn.list_guest_access(outsider, seeded.event_id).await.unwrap().is_empty());
        assert!(conn.list_guest_access(seeded.guest_id, seeded.event_id).await.unwrap().is_empty());

        let req = test::TestRequest::put()
            .uri(&uri)
            .set_json(json!({"guestIds": [seeded.guest_id], "eventDetailIndex": "0", "canAccess": false}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["updated"], 1);
    }
}
