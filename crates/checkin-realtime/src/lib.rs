//! Realtime channel client for Weather Check-in.
//!
//! Speaks the Phoenix channel protocol used by the hosted realtime service:
//! row-change feeds (`postgres_changes`) and presence.

pub mod channel;
pub mod client;
pub mod error;
pub mod presence;
pub mod protocol;

pub use channel::{ChangeFilter, ChannelControl, ChannelEvent, ChannelSpec, Subscription};
pub use client::RealtimeClient;
pub use error::RealtimeError;
pub use presence::PresenceState;
pub use protocol::{ChangeEvent, ChangeKind, Frame};

use async_trait::async_trait;

/// Something that can open realtime channels.
///
/// [`RealtimeClient`] is the websocket implementation.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Join a channel. The channel is left when the returned
    /// [`Subscription`] is dropped.
    async fn subscribe(&self, spec: ChannelSpec) -> Result<Subscription, RealtimeError>;
}
