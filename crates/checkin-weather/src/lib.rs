//! Weather lookup for Weather Check-in
//!
//! Weather is mocked: a static table keyed by location name, with a fixed
//! default snapshot for any location the table does not know.

pub mod lookup;
pub mod types;

pub use lookup::{default_location, default_snapshot, is_known_location, lookup, popular_locations};
pub use types::*;
