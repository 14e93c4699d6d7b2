//! The logged-in identity, kept as one structured value.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::{Role, User};

/// Who is logged in on this device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Opaque client-generated token, e.g. `user-token-1700000000000`.
    pub token: String,
    pub user: User,
}

impl Session {
    pub fn new(user: User) -> Self {
        let token = format!("{}-token-{}", user.role.as_str(), Utc::now().timestamp_millis());
        Self { token, user }
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_carries_role() {
        let session = Session::new(User {
            id: "admin-001".to_string(),
            email: "admin@civicbridge.com".to_string(),
            name: "Administrator".to_string(),
            role: Role::Admin,
            created_at: None,
        });
        assert!(session.token.starts_with("admin-token-"));
        assert!(session.is_admin());
    }
}
