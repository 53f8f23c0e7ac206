use checkin_core::{AppError, RealtimeError as FeedError};
use checkin_realtime::RealtimeError;

use super::IntoAppError;

impl IntoAppError for RealtimeError {
    fn into_app_error(self) -> AppError {
        match self {
            RealtimeError::Connect(s) | RealtimeError::Protocol(s) => {
                AppError::Realtime(FeedError::ConnectionFailed(s))
            }
            RealtimeError::JoinRejected { topic, reason } => {
                AppError::Realtime(FeedError::JoinRejected(format!("{}: {}", topic, reason)))
            }
            RealtimeError::Closed => AppError::Realtime(FeedError::Closed),
        }
    }
}
