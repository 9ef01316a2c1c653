pub mod access;
pub mod bus;
pub mod channel;
pub mod filter;
pub mod origin;
pub mod rsvp;
pub mod snapshot;
pub mod url_encoder;
pub mod wishes;

pub use access::{AccessError, AccessMatrix};
pub use bus::{BusOutcome, FrameContext, FrameOptions, MessageBus};
pub use channel::{ChannelError, FrameChannel, RetryPolicy};
pub use url_encoder::{build_invitation_url, UrlExtras};
