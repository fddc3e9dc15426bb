// Persistence seam shared by the PostgreSQL gateway and the in-memory store

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ApiResult;
use crate::models::{EntryFilter, MoodEntry, NewMoodEntry, NewUser, User};

/// Every operation a handler may issue. Reads never return soft-deleted rows.
#[async_trait]
pub trait MoodStore: Send + Sync {
    /// Fails with `ApiError::Conflict` when the username or email is taken.
    async fn insert_user(&self, user: NewUser) -> ApiResult<User>;

    async fn find_user_by_id(&self, id: i64) -> ApiResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> ApiResult<Option<User>>;

    async fn insert_entry(&self, entry: NewMoodEntry) -> ApiResult<MoodEntry>;

    async fn find_entry(&self, id: i64) -> ApiResult<Option<MoodEntry>>;

    /// Matching entries in ascending id order.
    async fn list_entries(&self, filter: &EntryFilter) -> ApiResult<Vec<MoodEntry>>;

    /// Writes every column of `entry` back to its row.
    /// Fails with `ApiError::NotFound` if the row is gone or soft-deleted.
    async fn save_entry(&self, entry: &MoodEntry) -> ApiResult<MoodEntry>;

    /// Stamps `deleted_at`. Fails with `ApiError::NotFound` if no live row matches.
    async fn soft_delete_entry(&self, id: i64, at: DateTime<Utc>) -> ApiResult<()>;
}
