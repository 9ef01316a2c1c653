use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use ts_rs::TS;

/// One stored visibility grant. `event_detail_index` is the ordinal of the
/// sub-event inside `details.events`, so reordering sub-events remaps grants.
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GuestEventAccess {
    pub guest_id: i64,
    pub event_id: i64,
    pub event_detail_index: String,
    pub can_access: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubEventAccess {
    pub event_detail_index: String,
    pub can_access: bool,
}

/// Access rows for one guest, open by default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestAccessGrid {
    grants: HashMap<String, bool>,
}

impl GuestAccessGrid {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a GuestEventAccess>) -> Self {
        Self {
            grants: rows
                .into_iter()
                .map(|row| (row.event_detail_index.clone(), row.can_access))
                .collect(),
        }
    }

    pub fn has_access(&self, event_detail_index: &str) -> bool {
        self.grants.get(event_detail_index).copied().unwrap_or(true)
    }

    /// One entry per sub-event currently on the event.
    pub fn describe(&self, sub_event_count: usize) -> Vec<SubEventAccess> {
        (0..sub_event_count)
            .map(|i| {
                let index = i.to_string();
                SubEventAccess {
                    can_access: self.has_access(&index),
                    event_detail_index: index,
                }
            })
            .collect()
    }

    /// The sub-events this guest may see, in their original order.
    pub fn filter_sub_events(&self, sub_events: &[Value]) -> Vec<Value> {
        sub_events
            .iter()
            .enumerate()
            .filter(|(i, _)| self.has_access(&i.to_string()))
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct SetAccessRequest {
    pub guest_ids: Vec<i64>,
    /// When omitted, the grant applies to every current sub-event.
    pub event_detail_index: Option<String>,
    pub can_access: bool,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct GuestAccessResponse {
    pub guest_id: i64,
    pub event_id: i64,
    pub access: Vec<SubEventAccess>,
}
