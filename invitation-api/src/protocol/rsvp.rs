use crate::database::guests::ProgressWrite;
use crate::database::InvitationStore;
use crate::protocol::snapshot::status_update;
use async_trait::async_trait;
use serde_json::{Map, Value};
use shared_types::rsvp_field::validate_answers;
use shared_types::{
    FieldValidationError, Guest, GuestTransition, InboundKind, RsvpData, StatusUpdate,
    TransitionError,
};
use std::sync::Arc;

/// Keys the bus adds to every RSVP payload; never part of the answers.
const ENVELOPE_KEYS: &[&str] = &["eventId", "guestId", "guestName", "status", "type", "timestamp"];

/// A write whose precondition was invalidated by a concurrent one is
/// decided again from a fresh read, at most this many times.
const MAX_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum RsvpError {
    #[error("Guest {0} not found")]
    GuestNotFound(i64),
    #[error("Event {0} not found")]
    EventNotFound(i64),
    #[error("Guest {guest_id} does not belong to event {event_id}")]
    WrongEvent { guest_id: i64, event_id: i64 },
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Validation(#[from] FieldValidationError),
    #[error("Guest {0} kept changing while saving the RSVP")]
    Conflict(i64),
    #[error("Failed to save RSVP: {0}")]
    Store(#[from] anyhow::Error),
}

/// One RSVP mutation for a guest of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct RsvpRequest {
    pub event_id: i64,
    pub guest_id: i64,
    pub transition: GuestTransition,
    /// Preview renders compute the result without persisting it.
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RsvpOutcome {
    /// The guest as stored after the mutation.
    pub guest: Guest,
    pub changed: bool,
    pub update: StatusUpdate,
}

/// Maps an RSVP-family message onto a guest transition.
///
/// `fields` is the merged `data`/`payload` object. Returns `None` for
/// messages that carry no transition (`TEMPLATE_READY`, or a
/// `STATUS_UPDATE` that only asks for the current state).
pub fn transition_for(kind: InboundKind, fields: &Map<String, Value>) -> Option<GuestTransition> {
    match kind {
        InboundKind::InvitationViewed => Some(GuestTransition::MarkViewed),
        InboundKind::GuestAccepted => Some(GuestTransition::Accept),
        InboundKind::RsvpSubmitted => Some(GuestTransition::Submit(answers_from(fields))),
        InboundKind::RsvpUpdated => Some(GuestTransition::Edit(answers_from(fields))),
        InboundKind::StatusUpdate => match fields.get("status").and_then(Value::as_str) {
            Some("viewed") => Some(GuestTransition::MarkViewed),
            Some("accepted") => Some(GuestTransition::Accept),
            Some("submitted") => {
                let answers = answers_from(fields);
                (!answers.is_empty()).then_some(GuestTransition::Submit(answers))
            }
            _ => None,
        },
        _ => None,
    }
}

/// Answers come as `rsvpData`, `responses`, or inline next to the envelope keys.
fn answers_from(fields: &Map<String, Value>) -> RsvpData {
    for key in ["rsvpData", "responses"] {
        match fields.get(key) {
            Some(Value::Object(answers)) => return answers.clone(),
            Some(Value::String(raw)) => {
                if let Ok(answers) = serde_json::from_str::<RsvpData>(raw) {
                    return answers;
                }
            }
            _ => {}
        }
    }

    fields
        .iter()
        .filter(|(key, _)| !ENVELOPE_KEYS.contains(&key.as_str()))
        .filter(|(key, _)| !matches!(key.as_str(), "rsvpData" | "responses"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[async_trait]
pub trait RsvpHandler: Send + Sync {
    async fn apply(&self, request: RsvpRequest) -> Result<RsvpOutcome, RsvpError>;

    /// Current state without mutating anything.
    async fn current(&self, event_id: i64, guest_id: i64) -> Result<RsvpOutcome, RsvpError>;
}

/// Applies guest transitions against the store: read, validate, apply,
/// persist, then re-read so the returned state is what is stored.
///
/// Messages are handled without a lock. Each transition persists as a
/// single-column monotonic write, so a view racing an accept keeps both.
#[derive(Clone)]
pub struct RsvpSyncService {
    store: Arc<dyn InvitationStore>,
}

impl RsvpSyncService {
    pub fn new(store: Arc<dyn InvitationStore>) -> Self {
        Self { store }
    }

    async fn load(&self, event_id: i64, guest_id: i64) -> Result<(shared_types::Event, Guest), RsvpError> {
        let guest = self
            .store
            .get_guest(guest_id)
            .await?
            .ok_or(RsvpError::GuestNotFound(guest_id))?;
        if guest.event_id != event_id {
            return Err(RsvpError::WrongEvent { guest_id, event_id });
        }
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or(RsvpError::EventNotFound(event_id))?;
        Ok((event, guest))
    }
}

/// The store write for a transition `guest.apply` accepted.
fn progress_write(guest: &Guest, transition: &GuestTransition) -> ProgressWrite {
    match transition {
        GuestTransition::MarkViewed => ProgressWrite::Viewed,
        GuestTransition::Accept => ProgressWrite::Accepted,
        GuestTransition::Submit(answers) | GuestTransition::Edit(answers) => {
            if guest.rsvp_data.is_none() {
                ProgressWrite::FirstAnswers(answers.clone())
            } else {
                ProgressWrite::Answers(answers.clone())
            }
        }
    }
}

#[async_trait]
impl RsvpHandler for RsvpSyncService {
    async fn apply(&self, request: RsvpRequest) -> Result<RsvpOutcome, RsvpError> {
        let RsvpRequest {
            event_id,
            guest_id,
            transition,
            dry_run,
        } = request;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let (event, guest) = self.load(event_id, guest_id).await?;
            let fields = self.store.list_rsvp_fields(event_id).await?;

            if let GuestTransition::Submit(answers) | GuestTransition::Edit(answers) = &transition {
                validate_answers(&fields, answers)?;
            }

            let now = chrono::Utc::now().timestamp();
            let next = guest
                .apply(&transition, now, &event.rsvp_config)
                .map_err(|e| {
                    tracing::warn!(
                        "Rejected {} for guest {} of event {}: {}",
                        transition.name(),
                        guest_id,
                        event_id,
                        e
                    );
                    e
                })?;

            let Some(progress) = next else {
                tracing::debug!("{} for guest {} is a no-op", transition.name(), guest_id);
                let update = status_update(&event, &guest, fields.len());
                return Ok(RsvpOutcome {
                    guest,
                    changed: false,
                    update,
                });
            };

            if dry_run {
                tracing::info!("Preview: not persisting {} for guest {}", transition.name(), guest_id);
                let guest = guest.with_progress(progress);
                let update = status_update(&event, &guest, fields.len());
                return Ok(RsvpOutcome {
                    guest,
                    changed: true,
                    update,
                });
            }

            let write = progress_write(&guest, &transition);
            if !self.store.record_progress(guest_id, &write, now).await? {
                tracing::debug!(
                    "Guest {} changed under {} write (attempt {}/{})",
                    guest_id,
                    write.name(),
                    attempt,
                    MAX_WRITE_ATTEMPTS
                );
                continue;
            }
            tracing::info!(
                "Applied {} for guest {} of event {}",
                transition.name(),
                guest_id,
                event_id
            );

            let guest = self
                .store
                .get_guest(guest_id)
                .await?
                .ok_or(RsvpError::GuestNotFound(guest_id))?;
            let update = status_update(&event, &guest, fields.len());
            return Ok(RsvpOutcome {
                guest,
                changed: true,
                update,
            });
        }

        Err(RsvpError::Conflict(guest_id))
    }

    async fn current(&self, event_id: i64, guest_id: i64) -> Result<RsvpOutcome, RsvpError> {
        let (event, guest) = self.load(event_id, guest_id).await?;
        let fields = self.store.list_rsvp_fields(event_id).await?;
        let update = status_update(&event, &guest, fields.len());
        Ok(RsvpOutcome {
            guest,
            changed: false,
            update,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{seed_wedding, temp_database, Seeded};
    use crate::database::AsyncDbConnection;
    use serde_json::json;
    use shared_types::GuestStatus;

    fn answers(value: Value) -> RsvpData {
        value.as_object().cloned().unwrap()
    }

    fn request(seeded: &Seeded, transition: GuestTransition) -> RsvpRequest {
        RsvpRequest {
            event_id: seeded.event_id,
            guest_id: seeded.guest_id,
            transition,
            dry_run: false,
        }
    }

    async fn service() -> (tempfile::TempDir, AsyncDbConnection, Seeded, RsvpSyncService) {
        let (dir, conn) = temp_database();
        let seeded = seed_wedding(&conn).await;
        let service = RsvpSyncService::new(Arc::new(conn.clone()));
        (dir, conn, seeded, service)
    }

    #[test]
    fn test_transition_mapping() {
        let fields = answers(json!({"eventId": "E1", "guestId": "G1", "meal": "fish"}));
        assert_eq!(
            transition_for(InboundKind::RsvpSubmitted, &fields),
            Some(GuestTransition::Submit(answers(json!({"meal": "fish"}))))
        );

        let nested = answers(json!({"guestId": "G1", "rsvpData": {"meal": "veg"}}));
        assert_eq!(
            transition_for(InboundKind::RsvpUpdated, &nested),
            Some(GuestTransition::Edit(answers(json!({"meal": "veg"}))))
        );

        let status = answers(json!({"status": "accepted"}));
        assert_eq!(transition_for(InboundKind::StatusUpdate, &status), Some(GuestTransition::Accept));
        assert_eq!(transition_for(InboundKind::StatusUpdate, &Map::new()), None);
        assert_eq!(transition_for(InboundKind::TemplateReady, &Map::new()), None);
    }

    #[tokio::test]
    async fn test_accept_then_submit() {
        let (_dir, conn, seeded, service) = service().await;

        let accepted = service.apply(request(&seeded, GuestTransition::Accept)).await.unwrap();
        assert!(accepted.changed);
        assert_eq!(accepted.guest.status(), GuestStatus::Accepted);
        assert!(!accepted.update.buttons.show_accept_button);
        assert!(accepted.update.buttons.show_submit_button);

        let submitted = service
            .apply(request(
                &seeded,
                GuestTransition::Submit(answers(json!({"meal": "fish", "song": "Dancing Queen"}))),
            ))
            .await
            .unwrap();
        assert_eq!(submitted.update.guest_status, GuestStatus::Submitted);
        assert!(submitted.update.buttons.show_edit_button);

        let stored = conn.get_guest(seeded.guest_id).await.unwrap().unwrap();
        assert_eq!(stored.rsvp_data.unwrap()["meal"], "fish");
    }

    #[tokio::test]
    async fn test_accept_twice_keeps_first_timestamp() {
        let (_dir, _conn, seeded, service) = service().await;

        let first = service.apply(request(&seeded, GuestTransition::Accept)).await.unwrap();
        let second = service.apply(request(&seeded, GuestTransition::Accept)).await.unwrap();
        assert!(!second.changed);
        assert_eq!(first.guest.accepted_at, second.guest.accepted_at);
    }

    #[tokio::test]
    async fn test_submit_before_accept_is_rejected() {
        let (_dir, conn, seeded, service) = service().await;

        let err = service
            .apply(request(&seeded, GuestTransition::Submit(answers(json!({"meal": "fish"})))))
            .await
            .unwrap_err();
        assert!(matches!(err, RsvpError::Transition(TransitionError::NotAccepted { .. })));

        let stored = conn.get_guest(seeded.guest_id).await.unwrap().unwrap();
        assert!(stored.rsvp_data.is_none());
    }

    #[tokio::test]
    async fn test_invalid_answers_are_rejected() {
        let (_dir, _conn, seeded, service) = service().await;
        service.apply(request(&seeded, GuestTransition::Accept)).await.unwrap();

        let err = service
            .apply(request(&seeded, GuestTransition::Submit(answers(json!({"song": "x"})))))
            .await
            .unwrap_err();
        assert!(matches!(err, RsvpError::Validation(FieldValidationError::MissingAnswer(_))));

        let err = service
            .apply(request(&seeded, GuestTransition::Submit(answers(json!({"meal": "steak"})))))
            .await
            .unwrap_err();
        assert!(matches!(err, RsvpError::Validation(FieldValidationError::UnknownOption { .. })));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_persist() {
        let (_dir, conn, seeded, service) = service().await;

        let outcome = service
            .apply(RsvpRequest {
                dry_run: true,
                ..request(&seeded, GuestTransition::Accept)
            })
            .await
            .unwrap();
        assert_eq!(outcome.guest.status(), GuestStatus::Accepted);

        let stored = conn.get_guest(seeded.guest_id).await.unwrap().unwrap();
        assert!(!stored.accepted);
    }

    #[tokio::test]
    async fn test_guest_of_other_event() {
        let (_dir, _conn, seeded, service) = service().await;
        let err = service
            .apply(RsvpRequest {
                event_id: seeded.event_id + 1,
                ..request(&seeded, GuestTransition::Accept)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RsvpError::WrongEvent { .. }));
    }

    /// Holds the viewed write until the accept write has landed, so the view
    /// is decided on a stale read and persisted last.
    struct ViewLandsLast {
        inner: AsyncDbConnection,
        accepted: tokio::sync::Notify,
    }

    #[async_trait]
    impl InvitationStore for ViewLandsLast {
        async fn get_event(&self, event_id: i64) -> anyhow::Result<Option<shared_types::Event>> {
            self.inner.get_event(event_id).await
        }
        async fn find_event(&self, reference: &str) -> anyhow::Result<Option<shared_types::Event>> {
            self.inner.find_event(reference).await
        }
        async fn get_guest(&self, guest_id: i64) -> anyhow::Result<Option<Guest>> {
            self.inner.get_guest(guest_id).await
        }
        async fn find_guest(&self, event_id: i64, reference: &str) -> anyhow::Result<Option<Guest>> {
            self.inner.find_guest(event_id, reference).await
        }
        async fn record_progress(&self, guest_id: i64, write: &ProgressWrite, now: i64) -> anyhow::Result<bool> {
            if *write == ProgressWrite::Viewed {
                self.accepted.notified().await;
            }
            let written = self.inner.record_progress(guest_id, write, now).await?;
            if *write == ProgressWrite::Accepted {
                self.accepted.notify_one();
            }
            Ok(written)
        }
        async fn list_rsvp_fields(&self, event_id: i64) -> anyhow::Result<Vec<shared_types::RsvpFieldDef>> {
            self.inner.list_rsvp_fields(event_id).await
        }
        async fn list_guest_access(
            &self,
            guest_id: i64,
            event_id: i64,
        ) -> anyhow::Result<Vec<shared_types::GuestEventAccess>> {
            self.inner.list_guest_access(guest_id, event_id).await
        }
        async fn upsert_guest_access(
            &self,
            event_id: i64,
            guest_ids: &[i64],
            event_detail_indices: &[String],
            can_access: bool,
        ) -> anyhow::Result<usize> {
            self.inner
                .upsert_guest_access(event_id, guest_ids, event_detail_indices, can_access)
                .await
        }
        async fn list_wishes(&self, event_id: i64, approved_only: bool) -> anyhow::Result<Vec<shared_types::Wish>> {
            self.inner.list_wishes(event_id, approved_only).await
        }
        async fn insert_wish(&self, event_id: i64, wish: &shared_types::NewWish, is_approved: bool) -> anyhow::Result<i64> {
            self.inner.insert_wish(event_id, wish, is_approved).await
        }
        async fn approve_wish(&self, event_id: i64, wish_id: i64) -> anyhow::Result<bool> {
            self.inner.approve_wish(event_id, wish_id).await
        }
        async fn delete_wish(&self, event_id: i64, wish_id: i64) -> anyhow::Result<bool> {
            self.inner.delete_wish(event_id, wish_id).await
        }
        async fn toggle_wish_like(&self, event_id: i64, wish_id: i64, liker_key: &str) -> anyhow::Result<Option<i64>> {
            self.inner.toggle_wish_like(event_id, wish_id, liker_key).await
        }
        async fn insert_wish_reply(
            &self,
            event_id: i64,
            reply: &shared_types::NewWishReply,
        ) -> anyhow::Result<Option<i64>> {
            self.inner.insert_wish_reply(event_id, reply).await
        }
    }

    #[tokio::test]
    async fn test_view_racing_accept_keeps_accept() {
        let (_dir, conn) = temp_database();
        let seeded = seed_wedding(&conn).await;
        let service = RsvpSyncService::new(Arc::new(ViewLandsLast {
            inner: conn.clone(),
            accepted: tokio::sync::Notify::new(),
        }));

        let (viewed, accepted) = tokio::join!(
            service.apply(request(&seeded, GuestTransition::MarkViewed)),
            service.apply(request(&seeded, GuestTransition::Accept)),
        );
        assert!(viewed.unwrap().changed);
        assert_eq!(accepted.unwrap().update.guest_status, GuestStatus::Accepted);

        let stored = conn.get_guest(seeded.guest_id).await.unwrap().unwrap();
        assert!(stored.viewed);
        assert!(stored.accepted);
        assert_eq!(stored.status(), GuestStatus::Accepted);
    }
}
