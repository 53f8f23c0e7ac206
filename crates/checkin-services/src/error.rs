//! Check-in service error types.

use serde::Deserialize;
use thiserror::Error;

/// PostgreSQL `unique_violation`; raised by the one-check-in-per-day constraint.
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Not authenticated")]
    NotAuthenticated,

    /// The per-user-per-day uniqueness constraint rejected the insert
    #[error("Duplicate check-in: {0}")]
    Duplicate(String),

    #[error("Invalid check-in: {0}")]
    Validation(String),

    #[error("Backend error ({status}): {message}")]
    Backend {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Error body returned by the REST layer
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

impl ServiceError {
    /// Classify a non-success response body.
    ///
    /// The unique-violation code maps to [`ServiceError::Duplicate`]; anything
    /// else is passed through as [`ServiceError::Backend`].
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = match (parsed.message, parsed.details) {
            (Some(m), Some(d)) => format!("{} ({})", m, d),
            (Some(m), None) => m,
            (None, _) if !body.is_empty() => body.to_string(),
            (None, _) => format!("HTTP {}", status),
        };

        if parsed.code.as_deref() == Some(UNIQUE_VIOLATION) {
            return Self::Duplicate(message);
        }

        Self::Backend {
            status,
            code: parsed.code,
            message,
        }
    }

    /// Whether this is the already-checked-in-today conflict
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    /// Whether a read failing this way may succeed if sent again: timeouts,
    /// connection failures, 408, 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| transient_status(s.as_u16()))
            }
            Self::Backend { status, .. } => transient_status(*status),
            _ => false,
        }
    }

    /// User-friendly error message for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotAuthenticated => "Please sign in to check in".to_string(),
            Self::Duplicate(_) => "You've already checked in today!".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::Backend { .. } | Self::InvalidResponse(_) | Self::Url(_) => {
                "Failed to check in. Please try again.".to_string()
            }
            Self::Network(_) => "Network error. Check your connection.".to_string(),
        }
    }
}

fn transient_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}
