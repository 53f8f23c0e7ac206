//! Live feed of recent check-ins and online users.
//!
//! [`LiveFeed`] keeps a bounded, newest-first list of check-ins and the set of
//! other users online, current while an identity is attached. It performs one
//! bulk fetch per session and is kept current by realtime change and presence
//! events after that.

pub mod feed;
pub mod state;

pub use feed::{submit_check_in, FeedUpdate, LiveFeed, CHECK_INS_CHANNEL, PRESENCE_CHANNEL};
pub use state::{apply_insert, apply_presence_sync, apply_update, FeedState, UserPresence};
