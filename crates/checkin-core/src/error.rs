//! Centralized error types for the Weather Check-in client.
//!
//! This module provides a typed error hierarchy that:
//! - Enables precise error handling throughout the codebase
//! - Provides user-friendly messages suitable for display
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Crate-level errors (services, auth, realtime) are mapped into this type by
/// the presentation layer. Use `user_message()` to get a display message.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Check-in error: {0}")]
    CheckIn(#[from] CheckInError),

    #[error("Realtime error: {0}")]
    Realtime(#[from] RealtimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Service-level errors that have no closer mapping.
    #[error("Service error: {0}")]
    Service(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Auth(e) => e.user_message(),
            AppError::CheckIn(e) => e.user_message(),
            AppError::Realtime(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Service(_) => "Something went wrong. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

/// Authentication errors (session, tokens, credentials).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not signed in")]
    NotSignedIn,

    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Sign-in failed: {0}")]
    SignInFailed(String),

    #[error("Session storage error: {0}")]
    StorageError(String),
}

impl AuthError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::NotSignedIn => "Not signed in. Please sign in first.",
            AuthError::SessionExpired => "Your session has expired. Please sign in again.",
            AuthError::InvalidCredentials => "Invalid email or password.",
            AuthError::SignInFailed(_) => "Sign-in failed. Please try again.",
            AuthError::StorageError(_) => "Failed to save your session. Please try again.",
        }
    }
}

/// Daily check-in errors.
#[derive(Debug, Error)]
pub enum CheckInError {
    /// The backend's one-check-in-per-day constraint was violated
    #[error("Already checked in today")]
    AlreadyCheckedIn,

    #[error("Invalid check-in: {0}")]
    Invalid(String),

    #[error("Check-in failed: {0}")]
    Failed(String),
}

impl CheckInError {
    pub fn user_message(&self) -> &'static str {
        match self {
            CheckInError::AlreadyCheckedIn => "You've already checked in today!",
            CheckInError::Invalid(_) => "Please check your notes and try again.",
            CheckInError::Failed(_) => "Failed to check in. Please try again.",
        }
    }
}

/// Live feed connection errors.
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Channel join rejected: {0}")]
    JoinRejected(String),

    #[error("Connection closed")]
    Closed,
}

impl RealtimeError {
    pub fn user_message(&self) -> &'static str {
        match self {
            RealtimeError::ConnectionFailed(_) => {
                "Live updates are unavailable. Check your connection."
            }
            RealtimeError::JoinRejected(_) => "Live updates were refused by the server.",
            RealtimeError::Closed => "Live updates stopped. Restart the feed to reconnect.",
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
