//! Feed state and the merge rules applied to it.

use chrono::{DateTime, Utc};
use checkin_auth::Identity;
use checkin_services::CheckIn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user announced on the presence channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPresence {
    pub user_id: Uuid,
    pub display_name: String,
    pub online_at: DateTime<Utc>,
    pub location: String,
}

impl UserPresence {
    /// Presence record for `identity`, online now at `location`
    pub fn new(identity: &Identity, location: impl Into<String>) -> Self {
        Self {
            user_id: identity.id,
            display_name: identity.display_name(),
            online_at: Utc::now(),
            location: location.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedState {
    /// Newest first, at most the feed limit
    pub check_ins: Vec<CheckIn>,
    /// Everyone on the presence channel except the attached user
    pub online_users: Vec<UserPresence>,
    /// True until the bulk fetch of the current session has resolved
    pub loading: bool,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            check_ins: Vec::new(),
            online_users: Vec::new(),
            loading: true,
        }
    }
}

/// Put a newly inserted row at the front, keeping at most `limit` rows.
///
/// A row already in the list is replaced where it is instead, so a change
/// that raced the bulk fetch is not listed twice.
pub fn apply_insert(check_ins: &mut Vec<CheckIn>, row: CheckIn, limit: usize) {
    if apply_update(check_ins, row.clone()) {
        return;
    }
    check_ins.insert(0, row);
    check_ins.truncate(limit);
}

/// Replace the row with the same id, keeping its position. Returns `false`
/// if no row matched.
pub fn apply_update(check_ins: &mut [CheckIn], row: CheckIn) -> bool {
    match check_ins.iter_mut().find(|c| c.id == row.id) {
        Some(existing) => {
            *existing = row;
            true
        }
        None => false,
    }
}

/// The new online set: every member except `self_id`
pub fn apply_presence_sync(members: Vec<UserPresence>, self_id: Uuid) -> Vec<UserPresence> {
    members.into_iter().filter(|m| m.user_id != self_id).collect()
}
