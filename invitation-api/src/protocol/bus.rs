//! The typed dispatcher behind one template frame.
//!
//! Inbound traffic is untrusted: every message is screened, its origin
//! checked, then classified into the RSVP or wish family and routed. Outbound
//! messages always go to the session's resolved template origin.

use crate::database::InvitationStore;
use crate::protocol::channel::{
    deliver_with_retry, resolve_target_origin, ChannelError, DeliveryReport, FrameChannel,
    RetryPolicy,
};
use crate::protocol::filter::screen;
use crate::protocol::origin::OriginPolicy;
use crate::protocol::rsvp::{transition_for, RsvpHandler, RsvpRequest, RsvpSyncService};
use crate::protocol::snapshot::GuestSnapshot;
use crate::protocol::wishes::{WishContext, WishHandler, WishRequest, WishService};
use serde_json::{Map, Value};
use shared_types::{
    Event, Guest, GuestTransition, InboundMessage, MessageFamily, OutboundMessage,
    OutboundPayload,
};
use std::sync::Arc;

/// Everything the bus knows about one mounted frame.
#[derive(Debug, Clone)]
pub struct FrameContext {
    pub event_id: i64,
    pub guest_id: i64,
    pub event_public_id: String,
    pub guest_public_id: String,
    pub guest_name: String,
    pub template_base_url: String,
    pub target_origin: String,
    pub origins: OriginPolicy,
    /// Preview renders never persist guest transitions.
    pub is_preview: bool,
    pub is_admin: bool,
}

/// Inputs to [`FrameContext::new`] that come from the mount request and config.
#[derive(Debug, Clone, Default)]
pub struct FrameOptions<'a> {
    pub page_origin: &'a str,
    pub known_template_origins: &'a [String],
    pub default_template_url: &'a str,
    pub dev_mode: bool,
    pub is_preview: bool,
    pub is_admin: bool,
}

impl FrameContext {
    pub fn new(event: &Event, guest: &Guest, options: &FrameOptions<'_>) -> Self {
        let template_base_url = event.template_base_url(options.default_template_url);
        let target_origin = resolve_target_origin(&template_base_url);
        let event_origin = event.external_template_origin();
        let template_origin = shared_types::origin_of(&template_base_url);

        let known: Vec<String> = options
            .known_template_origins
            .iter()
            .cloned()
            .chain(template_origin)
            .collect();
        let origins = OriginPolicy::new(
            options.page_origin,
            &known,
            event_origin.as_deref(),
            options.dev_mode,
        );

        Self {
            event_id: event.id,
            guest_id: guest.id,
            event_public_id: event.public_id(),
            guest_public_id: guest.public_id(),
            guest_name: guest.name.clone(),
            template_base_url,
            target_origin,
            origins,
            is_preview: options.is_preview,
            is_admin: options.is_admin,
        }
    }

    fn wish_context(&self) -> WishContext {
        WishContext {
            event_id: self.event_id,
            event_public_id: self.event_public_id.clone(),
            guest_id: (!self.is_admin).then_some(self.guest_id),
            liker_key: (!self.is_admin).then(|| self.guest_public_id.clone()),
            is_admin: self.is_admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusOutcome {
    Handled,
    /// Dropped before or instead of business logic; logged, never surfaced.
    Ignored(String),
    /// A user action that failed and should be shown to the guest.
    Failed(String),
}

#[derive(Clone)]
pub struct MessageBus {
    store: Arc<dyn InvitationStore>,
    rsvp: Arc<dyn RsvpHandler>,
    wishes: Arc<dyn WishHandler>,
    retry: RetryPolicy,
}

impl MessageBus {
    pub fn new(store: Arc<dyn InvitationStore>, retry: RetryPolicy) -> Self {
        let rsvp = Arc::new(RsvpSyncService::new(store.clone()));
        let wishes = Arc::new(WishService::new(store.clone()));
        Self::with_handlers(store, rsvp, wishes, retry)
    }

    pub fn with_handlers(
        store: Arc<dyn InvitationStore>,
        rsvp: Arc<dyn RsvpHandler>,
        wishes: Arc<dyn WishHandler>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            rsvp,
            wishes,
            retry,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Screens, authenticates and dispatches one raw `message` event.
    pub async fn handle_inbound(
        &self,
        ctx: &FrameContext,
        channel: &dyn FrameChannel,
        origin: &str,
        raw: &Value,
    ) -> BusOutcome {
        let message = match screen(raw) {
            Ok(message) => message,
            Err(rejection) => {
                tracing::debug!("Filtered inbound message from {}: {}", origin, rejection);
                return BusOutcome::Ignored(rejection.to_string());
            }
        };

        if !ctx.origins.check(origin).is_allowed() {
            tracing::warn!("Rejected {} from untrusted origin {}", message.kind, origin);
            return BusOutcome::Ignored(format!("untrusted origin {origin}"));
        }

        match message.kind.family() {
            MessageFamily::Rsvp => self.dispatch_rsvp(ctx, channel, &message).await,
            MessageFamily::Wish => self.dispatch_wish(ctx, channel, &message).await,
        }
    }

    /// Native iframe load: record the view and push the full payload on the
    /// retry schedule. Failures here are logged only.
    pub async fn on_frame_load(&self, ctx: &FrameContext, channel: &dyn FrameChannel) -> DeliveryReport {
        if !ctx.is_preview {
            let request = RsvpRequest {
                event_id: ctx.event_id,
                guest_id: ctx.guest_id,
                transition: GuestTransition::MarkViewed,
                dry_run: false,
            };
            if let Err(e) = self.rsvp.apply(request).await {
                tracing::warn!("Could not mark guest {} as viewed: {}", ctx.guest_id, e);
            }
        }

        let Some(message) = self.invitation_loaded(ctx).await else {
            return DeliveryReport::default();
        };
        deliver_with_retry(channel, &message, &ctx.target_origin, &self.retry).await
    }

    async fn invitation_loaded(&self, ctx: &FrameContext) -> Option<OutboundMessage> {
        match GuestSnapshot::load(self.store.as_ref(), ctx.event_id, ctx.guest_id).await {
            Ok(Some(snapshot)) => Some(OutboundMessage::new(OutboundPayload::InvitationLoaded(
                snapshot.invitation_loaded(ctx.is_preview),
            ))),
            Ok(None) => {
                tracing::warn!(
                    "Invitation for guest {} of event {} no longer exists",
                    ctx.guest_id,
                    ctx.event_id
                );
                None
            }
            Err(e) => {
                tracing::warn!("Failed to read invitation for guest {}: {}", ctx.guest_id, e);
                None
            }
        }
    }

    /// Readiness handshake. A frame that is not mounted yet is not an error:
    /// the load event will deliver the payload.
    async fn handshake(&self, ctx: &FrameContext, channel: &dyn FrameChannel) -> BusOutcome {
        let Some(message) = self.invitation_loaded(ctx).await else {
            return BusOutcome::Ignored("invitation data unavailable".to_string());
        };

        match channel.post_message(&message, &ctx.target_origin) {
            Ok(()) => tracing::info!("Sent INVITATION_LOADED for guest {}", ctx.guest_public_id),
            Err(ChannelError::FrameUnavailable) => {
                tracing::info!("Template ready but frame not available, waiting for load event");
            }
            Err(e) => tracing::warn!("Could not answer TEMPLATE_READY: {}", e),
        }
        BusOutcome::Handled
    }

    /// `{eventId, guestId, ...fields}` with the session's public ids.
    fn rsvp_fields(ctx: &FrameContext, message: &InboundMessage) -> Map<String, Value> {
        let mut fields = message.merged_fields();
        fields.insert("eventId".to_string(), Value::String(ctx.event_public_id.clone()));
        fields.insert("guestId".to_string(), Value::String(ctx.guest_public_id.clone()));
        fields
    }

    async fn dispatch_rsvp(
        &self,
        ctx: &FrameContext,
        channel: &dyn FrameChannel,
        message: &InboundMessage,
    ) -> BusOutcome {
        if message.kind == shared_types::InboundKind::TemplateReady {
            return self.handshake(ctx, channel).await;
        }

        let fields = Self::rsvp_fields(ctx, message);
        let result = match transition_for(message.kind, &fields) {
            Some(transition) => {
                self.rsvp
                    .apply(RsvpRequest {
                        event_id: ctx.event_id,
                        guest_id: ctx.guest_id,
                        transition,
                        dry_run: ctx.is_preview,
                    })
                    .await
            }
            None => self.rsvp.current(ctx.event_id, ctx.guest_id).await,
        };

        match result {
            Ok(outcome) => {
                let update = OutboundMessage::new(OutboundPayload::StatusUpdate(outcome.update));
                self.post(ctx, channel, &update);
                BusOutcome::Handled
            }
            Err(e) => {
                tracing::error!("{} from guest {} failed: {}", message.kind, ctx.guest_public_id, e);
                BusOutcome::Failed(e.to_string())
            }
        }
    }

    async fn dispatch_wish(
        &self,
        ctx: &FrameContext,
        channel: &dyn FrameChannel,
        message: &InboundMessage,
    ) -> BusOutcome {
        let mut fields = message.merged_fields();
        if message.kind == shared_types::InboundKind::SubmitNewWish {
            fields
                .entry("guestId")
                .or_insert_with(|| Value::String(ctx.guest_public_id.clone()));
            fields
                .entry("guestName")
                .or_insert_with(|| Value::String(ctx.guest_name.clone()));
        }

        let request = match WishRequest::parse(message.kind, &fields) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Malformed {}: {}", message.kind, e);
                return BusOutcome::Failed(e.to_string());
            }
        };

        match self.wishes.handle(&ctx.wish_context(), request).await {
            Ok(update) => {
                let update = OutboundMessage::new(OutboundPayload::InvitationPayloadUpdate(update));
                self.post(ctx, channel, &update);
                BusOutcome::Handled
            }
            Err(e) => {
                tracing::error!("{} on event {} failed: {}", message.kind, ctx.event_public_id, e);
                BusOutcome::Failed(e.to_string())
            }
        }
    }

    fn post(&self, ctx: &FrameContext, channel: &dyn FrameChannel, message: &OutboundMessage) {
        if let Err(e) = channel.post_message(message, &ctx.target_origin) {
            tracing::warn!("Could not post {} to frame: {}", message.type_name(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::{seed_wedding, temp_database, Seeded};
    use crate::database::AsyncDbConnection;
    use crate::protocol::channel::testing::RecordingChannel;
    use serde_json::json;
    use shared_types::{GuestStatus, StatusUpdate};

    const PAGE: &str = "https://host.example.com";
    const TEMPLATE: &str = "https://templates.example.com";

    async fn setup(preview: bool, admin: bool) -> (tempfile::TempDir, AsyncDbConnection, Seeded, MessageBus, FrameContext) {
        let (dir, conn) = temp_database();
        let seeded = seed_wedding(&conn).await;
        let store: Arc<dyn InvitationStore> = Arc::new(conn.clone());
        let bus = MessageBus::new(store, RetryPolicy::default());

        let event = conn.get_event(seeded.event_id).await.unwrap().unwrap();
        let guest = conn.get_guest(seeded.guest_id).await.unwrap().unwrap();
        let known = vec![TEMPLATE.to_string()];
        let ctx = FrameContext::new(
            &event,
            &guest,
            &FrameOptions {
                page_origin: PAGE,
                known_template_origins: &known,
                default_template_url: "https://templates.example.com/wedding",
                dev_mode: false,
                is_preview: preview,
                is_admin: admin,
            },
        );
        (dir, conn, seeded, bus, ctx)
    }

    fn last_status(channel: &RecordingChannel) -> StatusUpdate {
        match channel.messages().last().map(|m| m.payload.clone()) {
            Some(OutboundPayload::StatusUpdate(update)) => update,
            other => panic!("expected STATUS_UPDATE, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_guest_journey_end_to_end() {
        let (_dir, conn, seeded, bus, ctx) = setup(false, false).await;
        let channel = RecordingChannel::default();
        assert_eq!(ctx.target_origin, TEMPLATE);

        // Iframe load marks the guest viewed and delivers the payload on the schedule
        let report = bus.on_frame_load(&ctx, &channel).await;
        assert_eq!(report.sent, 3);
        assert!(channel.messages().iter().all(|m| m.type_name() == "INVITATION_LOADED"));
        assert!(channel.targets().iter().all(|t| t == TEMPLATE));
        let guest = conn.get_guest(seeded.guest_id).await.unwrap().unwrap();
        assert_eq!(guest.status(), GuestStatus::Viewed);

        let outcome = bus
            .handle_inbound(&ctx, &channel, TEMPLATE, &json!({"type": "GUEST_ACCEPTED"}))
            .await;
        assert_eq!(outcome, BusOutcome::Handled);
        let update = last_status(&channel);
        assert_eq!(update.guest_status, GuestStatus::Accepted);
        assert!(!update.buttons.show_accept_button);
        assert!(update.buttons.show_submit_button);

        let submit = json!({
            "type": "RSVP_SUBMITTED",
            "data": {"rsvpData": {"meal": "fish", "song": "Dancing Queen"}}
        });
        assert_eq!(bus.handle_inbound(&ctx, &channel, TEMPLATE, &submit).await, BusOutcome::Handled);
        let update = last_status(&channel);
        assert_eq!(update.guest_status, GuestStatus::Submitted);
        assert!(!update.buttons.show_submit_button);
        assert!(update.buttons.show_edit_button);

        let edit = json!({
            "type": "RSVP_UPDATED",
            "payload": {"rsvpData": {"meal": "veg", "song": "Dancing Queen"}}
        });
        assert_eq!(bus.handle_inbound(&ctx, &channel, TEMPLATE, &edit).await, BusOutcome::Handled);
        let update = last_status(&channel);
        assert_eq!(update.guest_status, GuestStatus::Submitted);

        let guest = conn.get_guest(seeded.guest_id).await.unwrap().unwrap();
        assert_eq!(guest.rsvp_data.unwrap()["meal"], "veg");
    }

    #[tokio::test]
    async fn test_noise_and_foreign_origins_are_ignored() {
        let (_dir, conn, seeded, bus, ctx) = setup(false, false).await;
        let channel = RecordingChannel::default();

        let noise = json!({"posdMessageId": "PANELOS_MESSAGE", "type": "GUEST_ACCEPTED"});
        assert!(matches!(
            bus.handle_inbound(&ctx, &channel, TEMPLATE, &noise).await,
            BusOutcome::Ignored(_)
        ));

        let accept = json!({"type": "GUEST_ACCEPTED"});
        assert!(matches!(
            bus.handle_inbound(&ctx, &channel, "https://evil.example.net", &accept).await,
            BusOutcome::Ignored(_)
        ));

        assert!(channel.messages().is_empty());
        let guest = conn.get_guest(seeded.guest_id).await.unwrap().unwrap();
        assert!(!guest.accepted);
    }

    #[tokio::test]
    async fn test_ready_before_mount_is_deferred() {
        let (_dir, _conn, _seeded, bus, ctx) = setup(false, false).await;
        let channel = RecordingChannel::unavailable();

        let outcome = bus
            .handle_inbound(&ctx, &channel, TEMPLATE, &json!({"type": "TEMPLATE_READY"}))
            .await;
        assert_eq!(outcome, BusOutcome::Handled);
        assert!(channel.messages().is_empty());

        channel.set_available();
        bus.handle_inbound(&ctx, &channel, TEMPLATE, &json!({"type": "TEMPLATE_READY"}))
            .await;
        assert_eq!(channel.messages().len(), 1);
        assert_eq!(channel.messages()[0].type_name(), "INVITATION_LOADED");
    }

    #[tokio::test]
    async fn test_invalid_transition_is_surfaced_without_update() {
        let (_dir, _conn, _seeded, bus, ctx) = setup(false, false).await;
        let channel = RecordingChannel::default();

        let submit = json!({"type": "RSVP_SUBMITTED", "data": {"meal": "fish"}});
        let outcome = bus.handle_inbound(&ctx, &channel, PAGE, &submit).await;
        assert!(matches!(outcome, BusOutcome::Failed(_)));
        assert!(channel.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_preview_never_persists() {
        let (_dir, conn, seeded, bus, ctx) = setup(true, false).await;
        let channel = RecordingChannel::default();

        bus.on_frame_load(&ctx, &channel).await;
        bus.handle_inbound(&ctx, &channel, TEMPLATE, &json!({"type": "GUEST_ACCEPTED"}))
            .await;
        assert_eq!(last_status(&channel).guest_status, GuestStatus::Accepted);

        let guest = conn.get_guest(seeded.guest_id).await.unwrap().unwrap();
        assert!(!guest.viewed);
        assert!(!guest.accepted);
    }

    #[tokio::test]
    async fn test_wish_submit_uses_session_guest() {
        let (_dir, conn, seeded, bus, ctx) = setup(false, false).await;
        let channel = RecordingChannel::default();

        let wish = json!({"type": "SUBMIT_NEW_WISH", "payload": {"content": "Congratulations!"}});
        assert_eq!(bus.handle_inbound(&ctx, &channel, TEMPLATE, &wish).await, BusOutcome::Handled);
        assert_eq!(channel.messages()[0].type_name(), "INVITATION_PAYLOAD_UPDATE");

        let stored = conn.list_wishes(seeded.event_id, false).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].guest_name, "Guest One");
        assert_eq!(stored[0].guest_id, Some(seeded.guest_id));
        assert!(!stored[0].is_approved);

        let named = json!({
            "type": "SUBMIT_NEW_WISH",
            "payload": {"content": "Cheers", "guestName": "Plus One"}
        });
        bus.handle_inbound(&ctx, &channel, TEMPLATE, &named).await;
        let stored = conn.list_wishes(seeded.event_id, false).await.unwrap();
        assert_eq!(stored[0].guest_name, "Plus One");
    }

    #[tokio::test]
    async fn test_guest_cannot_moderate() {
        let (_dir, _conn, _seeded, bus, ctx) = setup(false, false).await;
        let channel = RecordingChannel::default();

        let outcome = bus
            .handle_inbound(&ctx, &channel, TEMPLATE, &json!({"type": "APPROVE_WISH", "data": {"wishId": 1}}))
            .await;
        assert!(matches!(outcome, BusOutcome::Failed(_)));

        let (_dir, _conn, _seeded, bus, admin) = setup(false, true).await;
        let outcome = bus
            .handle_inbound(&admin, &channel, PAGE, &json!({"type": "REQUEST_INITIAL_ADMIN_WISHES"}))
            .await;
        assert_eq!(outcome, BusOutcome::Handled);
    }
}
