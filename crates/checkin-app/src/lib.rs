//! Command-line presentation layer for Weather Check-in.

pub mod cli;
pub mod commands;
pub mod error_mapping;
pub mod render;
pub mod services;

pub use cli::{Cli, Commands};
pub use error_mapping::{IntoAppError, ResultExt};
pub use services::{AppServices, FeedTransport};
