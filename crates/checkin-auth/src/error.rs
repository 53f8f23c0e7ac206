use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Session expired")]
    SessionExpired,

    #[error("Auth API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AuthError {
    /// Whether the stored session should be discarded after this error
    pub fn invalidates_session(&self) -> bool {
        matches!(
            self,
            Self::InvalidCredentials | Self::SessionExpired | Self::Api { status: 400..=499, .. }
        )
    }
}
