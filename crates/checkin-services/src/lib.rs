//! Hosted store access for Weather Check-in: row types, the backend trait
//! the live feed is written against, and its REST implementation.

pub mod backend;
pub mod error;
pub mod rest;
pub mod retry;
pub mod types;

pub use backend::CheckInBackend;
pub use error::{ServiceError, UNIQUE_VIOLATION};
pub use rest::RestClient;
pub use retry::ReadRetry;
pub use types::{CheckIn, CheckInInsert, Mood, NewCheckIn, Profile, ANONYMOUS, MAX_NOTES_CHARS};
