//! Maps crate-level errors to `checkin_core::AppError` for consistent
//! user-facing messages. Each source crate has its own module.

mod auth;
mod check_in;
mod realtime;

use checkin_core::AppError;

/// Conversion of a crate error into the application error hierarchy
pub trait IntoAppError {
    fn into_app_error(self) -> AppError;
}

/// `Result` adapter for [`IntoAppError`]
pub trait ResultExt<T> {
    fn app_err(self) -> Result<T, AppError>;
}

impl<T, E: IntoAppError> ResultExt<T> for Result<T, E> {
    fn app_err(self) -> Result<T, AppError> {
        self.map_err(IntoAppError::into_app_error)
    }
}
