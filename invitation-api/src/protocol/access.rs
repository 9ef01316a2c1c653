use crate::database::InvitationStore;
use shared_types::{GuestAccessGrid, SubEventAccess};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Event {0} not found")]
    EventNotFound(i64),
    #[error("Invalid sub-event index: {0}")]
    InvalidIndex(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Per guest, per sub-event visibility. Sub-events are addressed by their
/// position in `details.events`; a guest with no row for an index sees it.
#[derive(Clone)]
pub struct AccessMatrix {
    store: Arc<dyn InvitationStore>,
}

impl AccessMatrix {
    pub fn new(store: Arc<dyn InvitationStore>) -> Self {
        Self { store }
    }

    pub async fn grid(&self, guest_id: i64, event_id: i64) -> Result<GuestAccessGrid, AccessError> {
        let rows = self.store.list_guest_access(guest_id, event_id).await?;
        Ok(GuestAccessGrid::from_rows(&rows))
    }

    pub async fn has_access(
        &self,
        guest_id: i64,
        event_id: i64,
        event_detail_index: &str,
    ) -> Result<bool, AccessError> {
        Ok(self.grid(guest_id, event_id).await?.has_access(event_detail_index))
    }

    /// Access entries for every sub-event the event currently lists.
    pub async fn describe(&self, guest_id: i64, event_id: i64) -> Result<Vec<SubEventAccess>, AccessError> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or(AccessError::EventNotFound(event_id))?;
        let grid = self.grid(guest_id, event_id).await?;
        Ok(grid.describe(event.details.sub_events().len()))
    }

    pub async fn set_access(
        &self,
        event_id: i64,
        guest_ids: &[i64],
        event_detail_index: &str,
        can_access: bool,
    ) -> Result<usize, AccessError> {
        let index = normalize_index(event_detail_index)?;
        let written = self
            .store
            .upsert_guest_access(event_id, guest_ids, &[index.clone()], can_access)
            .await?;

        tracing::info!(
            "Set access to sub-event {} of event {} for {} guest(s): {}",
            index,
            event_id,
            guest_ids.len(),
            can_access
        );
        Ok(written)
    }

    /// Applies `can_access` to every sub-event index of the event as it is
    /// now. Sub-events added later default to visible.
    pub async fn set_access_for_all_details(
        &self,
        event_id: i64,
        guest_ids: &[i64],
        can_access: bool,
    ) -> Result<usize, AccessError> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or(AccessError::EventNotFound(event_id))?;

        let indices: Vec<String> = (0..event.details.sub_events().len())
            .map(|i| i.to_string())
            .collect();
        if indices.is_empty() {
            tracing::debug!("Event {} has no sub-events, nothing to update", event_id);
            return Ok(0);
        }

        let written = self
            .store
            .upsert_guest_access(event_id, guest_ids, &indices, can_access)
            .await?;

        tracing::info!(
            "Set access to all {} sub-events of event {} for {} guest(s): {}",
            indices.len(),
            event_id,
            guest_ids.len(),
            can_access
        );
        Ok(written)
    }
}

fn normalize_index(raw: &str) -> Result<String, AccessError> {
    raw.trim()
        .parse::<usize>()
        .map(|i| i.to_string())
        .map_err(|_| AccessError::InvalidIndex(raw.to_string()))
}
