// Models module

pub mod mood_entry;
pub mod user;

use chrono::{DateTime, SubsecRound, Utc};

// Re-export commonly used types
pub use mood_entry::{EntryFilter, MoodEntry, MoodEntryPayload, NewMoodEntry};
pub use user::{CreateUserRequest, NewUser, User};

/// Current time at the precision PostgreSQL stores (microseconds), so a
/// record echoed back to the caller matches the persisted one.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
