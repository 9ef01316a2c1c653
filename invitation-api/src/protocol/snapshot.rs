use crate::database::InvitationStore;
use anyhow::Result;
use serde_json::Value;
use shared_types::{
    ButtonFlags, Event, Guest, GuestAccessGrid, InvitationLoaded, RsvpFieldDef, StatusUpdate, Wish,
};

/// One consistent read of everything the handshake sends to a template.
#[derive(Debug, Clone)]
pub struct GuestSnapshot {
    pub event: Event,
    pub guest: Guest,
    pub fields: Vec<RsvpFieldDef>,
    pub access: GuestAccessGrid,
    pub wishes: Vec<Wish>,
}

impl GuestSnapshot {
    /// Reads event, guest, access rows, field definitions and approved
    /// wishes. `Ok(None)` when the event or guest no longer exists.
    pub async fn load(store: &dyn InvitationStore, event_id: i64, guest_id: i64) -> Result<Option<Self>> {
        let Some(event) = store.get_event(event_id).await? else {
            return Ok(None);
        };
        let Some(guest) = store.get_guest(guest_id).await? else {
            return Ok(None);
        };

        let fields = store.list_rsvp_fields(event_id).await?;
        let access_rows = store.list_guest_access(guest_id, event_id).await?;
        let wishes = if event.details.wishes_enabled() {
            store.list_wishes(event_id, true).await?
        } else {
            Vec::new()
        };

        Ok(Some(Self {
            event,
            guest,
            fields,
            access: GuestAccessGrid::from_rows(&access_rows),
            wishes,
        }))
    }

    pub fn buttons(&self) -> ButtonFlags {
        button_flags(&self.event, &self.guest, self.fields.len())
    }

    /// Event details with `events` narrowed to the sub-events this guest may see.
    pub fn visible_details(&self) -> Value {
        let mut details = self.event.details.0.clone();
        if details.contains_key("events") {
            let visible = self.access.filter_sub_events(self.event.details.sub_events());
            details.insert("events".to_string(), Value::Array(visible));
        }
        Value::Object(details)
    }

    pub fn invitation_loaded(&self, is_preview: bool) -> InvitationLoaded {
        let status = self.guest.status();
        InvitationLoaded {
            event_id: self.event.public_id(),
            guest_id: self.guest.public_id(),
            guest_name: self.guest.name.clone(),
            status: status.response(),
            guest_status: status,
            buttons: self.buttons(),
            rsvp_fields: self.fields.clone(),
            existing_rsvp_data: self.guest.rsvp_data.clone(),
            wishes_enabled: self.event.details.wishes_enabled(),
            wishes: self.wishes.iter().filter(|w| w.is_approved).cloned().collect(),
            event_details: self.visible_details(),
            guest_access: self.access.describe(self.event.details.sub_events().len()),
            is_preview,
        }
    }
}

pub fn button_flags(event: &Event, guest: &Guest, field_count: usize) -> ButtonFlags {
    ButtonFlags::compute(guest.status(), &event.rsvp_config, field_count)
}

pub fn status_update(event: &Event, guest: &Guest, field_count: usize) -> StatusUpdate {
    let status = guest.status();
    StatusUpdate {
        event_id: event.public_id(),
        guest_id: guest.public_id(),
        status: status.response(),
        guest_status: status,
        buttons: button_flags(event, guest, field_count),
        existing_rsvp_data: guest.rsvp_data.clone(),
    }
}
