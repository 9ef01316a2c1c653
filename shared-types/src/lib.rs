use serde::{Deserialize, Serialize};

pub mod access;
pub mod event;
pub mod frame;
pub mod guest;
pub mod message;
pub mod rsvp_field;
pub mod wish;

pub use access::{
    GuestAccessGrid, GuestAccessResponse, GuestEventAccess, SetAccessRequest, SubEventAccess,
};
pub use event::{origin_of, Event, EventDetails, EventsResponse, RsvpConfig, RsvpType, TemplateContract};
pub use frame::{
    BusOutcomeResponse, InboundEnvelope, InvitationLinkResponse, OpenFrameRequest,
    OpenFrameResponse, OutboxResponse, QueuedMessage, ReloadResponse,
};
pub use guest::{
    ButtonFlags, Guest, GuestProgress, GuestStatus, GuestTransition, RsvpData, TransitionError,
};
pub use message::{
    InboundKind, InboundMessage, InvitationLoaded, MessageFamily, OutboundMessage,
    OutboundPayload, PayloadUpdate, StatusUpdate,
};
pub use rsvp_field::{FieldValidationError, RsvpFieldDef, RsvpFieldType, RsvpFieldsResponse};
pub use wish::{NewWish, NewWishReply, Wish, WishReply, HAS_IMAGE_MARKER};

/// Error response for API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
