use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered user.
/// `deleted_at` marks the record as soft-deleted; live rows serialize it as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A user that has not been assigned an id yet.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of both user-creation endpoints.
/// Missing keys deserialize as empty strings and are rejected by `validate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.username.is_empty() || self.email.is_empty() {
            return Err("Username and email are required".to_string());
        }

        Ok(())
    }

    /// Stamps both timestamps with the same instant.
    pub fn into_new_user(self, now: DateTime<Utc>) -> NewUser {
        NewUser {
            username: self.username,
            email: self.email,
            created_at: now,
            updated_at: now,
        }
    }
}

impl NewUser {
    pub fn with_id(self, id: i64) -> User {
        User {
            id,
            username: self.username,
            email: self.email,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: None,
        }
    }
}
