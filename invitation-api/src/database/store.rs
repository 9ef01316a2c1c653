use anyhow::Result;
use async_trait::async_trait;
use shared_types::{
    Event, Guest, GuestEventAccess, NewWish, NewWishReply, RsvpFieldDef, Wish,
};

use crate::database::guests::ProgressWrite;
use crate::database::{events, guest_event_access, guests, rsvp_fields, wishes, AsyncDbConnection};

/// Typed read/write operations the protocol core needs from persistence.
#[async_trait]
pub trait InvitationStore: Send + Sync {
    async fn get_event(&self, event_id: i64) -> Result<Option<Event>>;
    async fn find_event(&self, reference: &str) -> Result<Option<Event>>;
    async fn get_guest(&self, guest_id: i64) -> Result<Option<Guest>>;
    async fn find_guest(&self, event_id: i64, reference: &str) -> Result<Option<Guest>>;
    /// Returns false when the write's precondition no longer holds.
    async fn record_progress(&self, guest_id: i64, write: &ProgressWrite, now: i64) -> Result<bool>;
    async fn list_rsvp_fields(&self, event_id: i64) -> Result<Vec<RsvpFieldDef>>;
    async fn list_guest_access(&self, guest_id: i64, event_id: i64) -> Result<Vec<GuestEventAccess>>;
    async fn upsert_guest_access(
        &self,
        event_id: i64,
        guest_ids: &[i64],
        event_detail_indices: &[String],
        can_access: bool,
    ) -> Result<usize>;
    async fn list_wishes(&self, event_id: i64, approved_only: bool) -> Result<Vec<Wish>>;
    async fn insert_wish(&self, event_id: i64, wish: &NewWish, is_approved: bool) -> Result<i64>;
    async fn approve_wish(&self, event_id: i64, wish_id: i64) -> Result<bool>;
    async fn delete_wish(&self, event_id: i64, wish_id: i64) -> Result<bool>;
    async fn toggle_wish_like(&self, event_id: i64, wish_id: i64, liker_key: &str) -> Result<Option<i64>>;
    async fn insert_wish_reply(&self, event_id: i64, reply: &NewWishReply) -> Result<Option<i64>>;
}

#[async_trait]
impl InvitationStore for AsyncDbConnection {
    async fn get_event(&self, event_id: i64) -> Result<Option<Event>> {
        events::get_event(self.clone(), event_id).await
    }

    async fn find_event(&self, reference: &str) -> Result<Option<Event>> {
        events::find_event(self.clone(), reference).await
    }

    async fn get_guest(&self, guest_id: i64) -> Result<Option<Guest>> {
        guests::get_guest(self.clone(), guest_id).await
    }

    async fn find_guest(&self, event_id: i64, reference: &str) -> Result<Option<Guest>> {
        guests::find_guest(self.clone(), event_id, reference).await
    }

    async fn record_progress(&self, guest_id: i64, write: &ProgressWrite, now: i64) -> Result<bool> {
        guests::record_progress(self.clone(), guest_id, write, now).await
    }

    async fn list_rsvp_fields(&self, event_id: i64) -> Result<Vec<RsvpFieldDef>> {
        rsvp_fields::list_fields(self.clone(), event_id).await
    }

    async fn list_guest_access(&self, guest_id: i64, event_id: i64) -> Result<Vec<GuestEventAccess>> {
        guest_event_access::list_for_guest(self.clone(), guest_id, event_id).await
    }

    async fn upsert_guest_access(
        &self,
        event_id: i64,
        guest_ids: &[i64],
        event_detail_indices: &[String],
        can_access: bool,
    ) -> Result<usize> {
        guest_event_access::upsert_access(self.clone(), event_id, guest_ids, event_detail_indices, can_access)
            .await
    }

    async fn list_wishes(&self, event_id: i64, approved_only: bool) -> Result<Vec<Wish>> {
        wishes::list_wishes(self.clone(), event_id, approved_only).await
    }

    async fn insert_wish(&self, event_id: i64, wish: &NewWish, is_approved: bool) -> Result<i64> {
        wishes::insert_wish(self.clone(), event_id, wish, is_approved).await
    }

    async fn approve_wish(&self, event_id: i64, wish_id: i64) -> Result<bool> {
        wishes::approve_wish(self.clone(), event_id, wish_id).await
    }

    async fn delete_wish(&self, event_id: i64, wish_id: i64) -> Result<bool> {
        wishes::delete_wish(self.clone(), event_id, wish_id).await
    }

    async fn toggle_wish_like(&self, event_id: i64, wish_id: i64, liker_key: &str) -> Result<Option<i64>> {
        wishes::toggle_like(self.clone(), event_id, wish_id, liker_key).await
    }

    async fn insert_wish_reply(&self, event_id: i64, reply: &NewWishReply) -> Result<Option<i64>> {
        wishes::insert_reply(self.clone(), event_id, reply).await
    }
}
