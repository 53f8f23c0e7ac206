use checkin_core::{AppError, AuthError, CheckInError, ConfigError, NetworkError, ReqwestErrorExt};
use checkin_services::ServiceError;

use super::IntoAppError;

impl IntoAppError for ServiceError {
    fn into_app_error(self) -> AppError {
        match self {
            ServiceError::NotAuthenticated => AppError::Auth(AuthError::NotSignedIn),
            ServiceError::Duplicate(_) => AppError::CheckIn(CheckInError::AlreadyCheckedIn),
            ServiceError::Validation(s) => AppError::CheckIn(CheckInError::Invalid(s)),
            ServiceError::Backend { status, message, .. } => {
                AppError::CheckIn(CheckInError::Failed(format!("{}: {}", status, message)))
            }
            ServiceError::InvalidResponse(s) => AppError::Network(NetworkError::InvalidResponse(s)),
            ServiceError::Url(e) => AppError::Config(ConfigError::Invalid(e.to_string())),
            ServiceError::Network(e) => AppError::Network(e.into_network_error()),
        }
    }
}
