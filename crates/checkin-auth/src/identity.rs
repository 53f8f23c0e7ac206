use serde::{Deserialize, Serialize};
use uuid::Uuid;

const ANONYMOUS: &str = "Anonymous";

/// The signed-in user as far as the rest of the client is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: Uuid, email: Option<String>) -> Self {
        Self { id, email }
    }

    /// Name shown to other users: the part of the email before `@`,
    /// or "Anonymous" when there is no usable email.
    pub fn display_name(&self) -> String {
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .map(str::trim)
            .filter(|local| !local.is_empty())
            .unwrap_or(ANONYMOUS)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_from_email() {
        let identity = Identity::new(Uuid::new_v4(), Some("ada@example.com".to_string()));
        assert_eq!(identity.display_name(), "ada");
    }

    #[test]
    fn test_display_name_without_email() {
        let identity = Identity::new(Uuid::new_v4(), None);
        assert_eq!(identity.display_name(), "Anonymous");
    }

    #[test]
    fn test_display_name_empty_local_part() {
        let identity = Identity::new(Uuid::new_v4(), Some("@example.com".to_string()));
        assert_eq!(identity.display_name(), "Anonymous");
    }

    #[test]
    fn test_display_name_without_at() {
        let identity = Identity::new(Uuid::new_v4(), Some("phone-user".to_string()));
        assert_eq!(identity.display_name(), "phone-user");
    }
}
