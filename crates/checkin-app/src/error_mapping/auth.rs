use checkin_auth::AuthError as SessionError;
use checkin_core::{AppError, AuthError, ConfigError, ReqwestErrorExt};

use super::IntoAppError;

impl IntoAppError for SessionError {
    fn into_app_error(self) -> AppError {
        match self {
            SessionError::InvalidCredentials => AppError::Auth(AuthError::InvalidCredentials),
            SessionError::SessionExpired => AppError::Auth(AuthError::SessionExpired),
            SessionError::Api { status, message } => {
                AppError::Auth(AuthError::SignInFailed(format!("{}: {}", status, message)))
            }
            SessionError::Storage(s) => AppError::Auth(AuthError::StorageError(s)),
            SessionError::Url(e) => AppError::Config(ConfigError::Invalid(e.to_string())),
            SessionError::Network(e) => AppError::Network(e.into_network_error()),
        }
    }
}
