//! The store operations the live feed depends on.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::types::{CheckIn, CheckInInsert, ANONYMOUS};

/// Access to the hosted `check_ins` and `profiles` tables.
///
/// [`crate::RestClient`] is the production implementation; tests substitute
/// an in-memory store.
#[async_trait]
pub trait CheckInBackend: Send + Sync {
    /// Most recent check-ins, newest first
    async fn recent_check_ins(&self, limit: usize) -> Result<Vec<CheckIn>, ServiceError>;

    /// A single check-in, `None` if no row has that id
    async fn check_in_by_id(&self, id: Uuid) -> Result<Option<CheckIn>, ServiceError>;

    /// `profiles.display_name` for a user, `None` if there is no profile
    async fn display_name(&self, user_id: Uuid) -> Result<Option<String>, ServiceError>;

    /// Insert a row and return it as stored
    async fn insert_check_in(&self, row: &CheckInInsert) -> Result<CheckIn, ServiceError>;

    /// Attach the author's display name, falling back to "Anonymous" when the
    /// profile lookup fails or finds nothing.
    async fn with_display_name(&self, check_in: CheckIn) -> CheckIn {
        let name = match self.display_name(check_in.user_id).await {
            Ok(Some(name)) if !name.trim().is_empty() => name,
            Ok(_) => ANONYMOUS.to_string(),
            Err(e) => {
                tracing::debug!("Profile lookup for {} failed: {}", check_in.user_id, e);
                ANONYMOUS.to_string()
            }
        };
        check_in.with_display_name(name)
    }
}
