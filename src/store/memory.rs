use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{ApiError, ApiResult};
use crate::models::{EntryFilter, MoodEntry, NewMoodEntry, NewUser, User};
use crate::store::MoodStore;

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    entries: Vec<MoodEntry>,
    next_user_id: i64,
    next_entry_id: i64,
}

/// Process-local store with the same uniqueness and soft-delete rules as the
/// PostgreSQL schema. Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ApiResult<std::sync::MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| ApiError::Database("Memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl MoodStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> ApiResult<User> {
        let mut tables = self.lock()?;

        let taken = tables.users.iter().any(|u| {
            u.deleted_at.is_none() && (u.username == user.username || u.email == user.email)
        });
        if taken {
            return Err(ApiError::conflict(
                "User with this username or email already exists",
            ));
        }

        tables.next_user_id += 1;
        let created = user.with_id(tables.next_user_id);
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn find_user_by_id(&self, id: i64) -> ApiResult<Option<User>> {
        let tables = self.lock()?;
        Ok(tables
            .users
            .iter()
            .find(|u| u.id == id && u.deleted_at.is_none())
            .cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> ApiResult<Option<User>> {
        let tables = self.lock()?;
        Ok(tables
            .users
            .iter()
            .find(|u| u.username == username && u.deleted_at.is_none())
            .cloned())
    }

    async fn insert_entry(&self, entry: NewMoodEntry) -> ApiResult<MoodEntry> {
        let mut tables = self.lock()?;
        tables.next_entry_id += 1;
        let created = entry.with_id(tables.next_entry_id);
        tables.entries.push(created.clone());
        Ok(created)
    }

    async fn find_entry(&self, id: i64) -> ApiResult<Option<MoodEntry>> {
        let tables = self.lock()?;
        Ok(tables
            .entries
            .iter()
            .find(|e| e.id == id && e.deleted_at.is_none())
            .cloned())
    }

    async fn list_entries(&self, filter: &EntryFilter) -> ApiResult<Vec<MoodEntry>> {
        let tables = self.lock()?;
        // Entries are appended with increasing ids, so insertion order is id order.
        Ok(tables
            .entries
            .iter()
            .filter(|e| e.deleted_at.is_none() && filter.matches(e))
            .cloned()
            .collect())
    }

    async fn save_entry(&self, entry: &MoodEntry) -> ApiResult<MoodEntry> {
        let mut tables = self.lock()?;
        let slot = tables
            .entries
            .iter_mut()
            .find(|e| e.id == entry.id && e.deleted_at.is_none())
            .ok_or_else(|| ApiError::not_found("Mood entry not found"))?;

        *slot = entry.clone();
        Ok(slot.clone())
    }

    async fn soft_delete_entry(&self, id: i64, at: DateTime<Utc>) -> ApiResult<()> {
        let mut tables = self.lock()?;
        let slot = tables
            .entries
            .iter_mut()
            .find(|e| e.id == id && e.deleted_at.is_none())
            .ok_or_else(|| ApiError::not_found("Mood entry not found"))?;

        slot.deleted_at = Some(at);
        Ok(())
    }
}
