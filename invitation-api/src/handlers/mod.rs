pub mod access;
pub mod frames;
pub mod invitations;

use crate::config::{ChannelConfig, TemplatesConfig};
use crate::database::{AsyncDbConnection, InvitationStore};
use crate::helpers::frame_sessions::FrameSessions;
use crate::protocol::MessageBus;
use std::sync::Arc;

/// Shared state for every invitation endpoint.
#[derive(Clone)]
pub struct InvitationAppState {
    pub db: AsyncDbConnection,
    pub bus: MessageBus,
    pub sessions: FrameSessions,
    pub templates: TemplatesConfig,
    pub channel: ChannelConfig,
}

impl InvitationAppState {
    pub fn new(db: AsyncDbConnection, templates: TemplatesConfig, channel: ChannelConfig) -> Self {
        let store: Arc<dyn InvitationStore> = Arc::new(db.clone());
        Self {
            bus: MessageBus::new(store, channel.retry_policy()),
            sessions: FrameSessions::new(channel.max_reloads, channel.outbox_capacity),
            db,
            templates,
            channel,
        }
    }

    pub fn store(&self) -> &dyn InvitationStore {
        &self.db
    }
}
