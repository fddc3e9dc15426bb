use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_MOOD_RATING: i32 = 1;
pub const MAX_MOOD_RATING: i32 = 10;

/// A single journal record.
/// `user_id` is an opaque owner key taken from the URL; it is not checked
/// against the users table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub id: i64,
    pub user_id: String,
    pub mood_rating: i32,
    pub day_highlight: String,
    pub dream_type: String,
    pub dream_notes: String,
    pub sleep_start_time: i64,
    pub sleep_end_time: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// An entry ready to insert.
#[derive(Debug, Clone)]
pub struct NewMoodEntry {
    pub user_id: String,
    pub mood_rating: i32,
    pub day_highlight: String,
    pub dream_type: String,
    pub dream_notes: String,
    pub sleep_start_time: i64,
    pub sleep_end_time: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating or updating an entry.
///
/// Every field is optional and `null` is the same as omitted. Keys that are
/// not listed here (`id`, `user_id`, timestamps) are ignored, so the owner
/// can only come from the path.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MoodEntryPayload {
    pub mood_rating: Option<i32>,
    pub day_highlight: Option<String>,
    pub dream_type: Option<String>,
    pub dream_notes: Option<String>,
    pub sleep_start_time: Option<i64>,
    pub sleep_end_time: Option<i64>,
}

/// Conjunctive filter for listing entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryFilter {
    pub user_id: Option<String>,
    /// Half-open `[start, end)` window on `created_at`.
    pub created_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

fn rating_in_range(rating: i32) -> bool {
    (MIN_MOOD_RATING..=MAX_MOOD_RATING).contains(&rating)
}

fn rating_error() -> String {
    format!(
        "Mood rating must be between {} and {}",
        MIN_MOOD_RATING, MAX_MOOD_RATING
    )
}

impl MoodEntryPayload {
    /// A new entry needs a rating in range; an absent rating counts as 0.
    pub fn validate_for_create(&self) -> Result<(), String> {
        if !rating_in_range(self.mood_rating.unwrap_or_default()) {
            return Err(rating_error());
        }
        Ok(())
    }

    /// Zero means "keep the current rating"; anything else must be in range.
    pub fn validate_for_update(&self) -> Result<(), String> {
        match self.mood_rating {
            Some(rating) if rating != 0 && !rating_in_range(rating) => Err(rating_error()),
            _ => Ok(()),
        }
    }

    pub fn into_new_entry(self, user_id: String, now: DateTime<Utc>) -> NewMoodEntry {
        NewMoodEntry {
            user_id,
            mood_rating: self.mood_rating.unwrap_or_default(),
            day_highlight: self.day_highlight.unwrap_or_default(),
            dream_type: self.dream_type.unwrap_or_default(),
            dream_notes: self.dream_notes.unwrap_or_default(),
            sleep_start_time: self.sleep_start_time.unwrap_or_default(),
            sleep_end_time: self.sleep_end_time.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl NewMoodEntry {
    pub fn with_id(self, id: i64) -> MoodEntry {
        MoodEntry {
            id,
            user_id: self.user_id,
            mood_rating: self.mood_rating,
            day_highlight: self.day_highlight,
            dream_type: self.dream_type,
            dream_notes: self.dream_notes,
            sleep_start_time: self.sleep_start_time,
            sleep_end_time: self.sleep_end_time,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn non_zero<T: Default + PartialEq>(value: Option<T>) -> Option<T> {
    value.filter(|v| *v != T::default())
}

impl MoodEntry {
    /// Overwrites only the fields carrying a non-empty, non-zero value.
    /// A caller therefore cannot clear a field back to `""` or `0`.
    /// `updated_at` is always refreshed.
    pub fn apply_update(&mut self, payload: MoodEntryPayload, now: DateTime<Utc>) {
        if let Some(rating) = non_zero(payload.mood_rating) {
            self.mood_rating = rating;
        }
        if let Some(highlight) = non_empty(payload.day_highlight) {
            self.day_highlight = highlight;
        }
        if let Some(dream_type) = non_empty(payload.dream_type) {
            self.dream_type = dream_type;
        }
        if let Some(notes) = non_empty(payload.dream_notes) {
            self.dream_notes = notes;
        }
        if let Some(start) = non_zero(payload.sleep_start_time) {
            self.sleep_start_time = start;
        }
        if let Some(end) = non_zero(payload.sleep_end_time) {
            self.sleep_end_time = end;
        }

        self.updated_at = now;
    }
}

/// `dddd-dd-dd`, ASCII digits only.
fn is_iso_day(date: &str) -> bool {
    let bytes = date.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

impl EntryFilter {
    /// Parses a `YYYY-MM-DD` date into the UTC day window `[00:00, +24h)`.
    /// Only the exact zero-padded shape is accepted; chrono alone would also
    /// take `2024-3-1` or a signed year.
    pub fn day_window(date: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
        let invalid = || "Invalid date format. Use YYYY-MM-DD".to_string();

        if !is_iso_day(date) {
            return Err(invalid());
        }
        let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| invalid())?;
        let start = day.and_hms_opt(0, 0, 0).ok_or_else(invalid)?.and_utc();

        Ok((start, start + Duration::hours(24)))
    }

    pub fn matches(&self, entry: &MoodEntry) -> bool {
        if let Some(ref user_id) = self.user_id {
            if &entry.user_id != user_id {
                return false;
            }
        }
        if let Some((start, end)) = self.created_between {
            if entry.created_at < start || entry.created_at >= end {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(ts).unwrap().with_timezone(&Utc)
    }

    fn entry() -> MoodEntry {
        MoodEntryPayload {
            mood_rating: Some(5),
            day_highlight: Some("beach".to_string()),
            dream_type: Some("lucid".to_string()),
            dream_notes: Some("flying".to_string()),
            sleep_start_time: Some(2300),
            sleep_end_time: Some(700),
        }
        .into_new_entry("ava".to_string(), at("2024-03-01T10:00:00Z"))
        .with_id(1)
    }

    fn rating(r: i32) -> MoodEntryPayload {
        MoodEntryPayload {
            mood_rating: Some(r),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_rating_bounds() {
        for r in 1..=10 {
            assert!(rating(r).validate_for_create().is_ok(), "rating {} should pass", r);
        }
        for r in [-1, 0, 11, 100] {
            assert!(rating(r).validate_for_create().is_err(), "rating {} should fail", r);
        }
        assert!(MoodEntryPayload::default().validate_for_create().is_err());
    }

    #[test]
    fn test_update_rating_bounds() {
        assert!(rating(0).validate_for_update().is_ok());
        assert!(MoodEntryPayload::default().validate_for_update().is_ok());
        assert!(rating(3).validate_for_update().is_ok());
        assert!(rating(11).validate_for_update().is_err());
        assert!(rating(-4).validate_for_update().is_err());
    }

    #[test]
    fn test_apply_update_overwrites_only_set_fields() {
        let mut e = entry();
        let created = e.created_at;
        let later = at("2024-03-01T12:00:00Z");

        e.apply_update(
            MoodEntryPayload {
                mood_rating: Some(8),
                dream_notes: Some("falling".to_string()),
                ..Default::default()
            },
            later,
        );

        assert_eq!(e.mood_rating, 8);
        assert_eq!(e.dream_notes, "falling");
        assert_eq!(e.day_highlight, "beach");
        assert_eq!(e.sleep_start_time, 2300);
        assert_eq!(e.created_at, created);
        assert_eq!(e.updated_at, later);
    }

    #[test]
    fn test_apply_update_ignores_zero_and_empty() {
        let mut e = entry();
        e.apply_update(
            MoodEntryPayload {
                mood_rating: Some(0),
                day_highlight: Some(String::new()),
                sleep_end_time: Some(0),
                ..Default::default()
            },
            at("2024-03-02T00:00:00Z"),
        );

        assert_eq!(e.mood_rating, 5);
        assert_eq!(e.day_highlight, "beach");
        assert_eq!(e.sleep_end_time, 700);
    }

    #[test]
    fn test_payload_ignores_owner_and_nulls() {
        let payload: MoodEntryPayload =
            serde_json::from_str(r#"{"mood_rating":7,"user_id":"mallory","id":99,"dream_type":null}"#)
                .unwrap();
        assert_eq!(payload.mood_rating, Some(7));
        assert_eq!(payload.dream_type, None);

        let stored = payload.into_new_entry("ava".to_string(), Utc::now());
        assert_eq!(stored.user_id, "ava");
        assert_eq!(stored.dream_type, "");
    }

    #[test]
    fn test_day_window() {
        let (start, end) = EntryFilter::day_window("2024-03-01").unwrap();
        assert_eq!(start, at("2024-03-01T00:00:00Z"));
        assert_eq!(end, at("2024-03-02T00:00:00Z"));

        assert!(EntryFilter::day_window("03/01/2024").is_err());
        assert!(EntryFilter::day_window("2024-02-30").is_err());

        for loose in [
            "2024-3-1",
            "2024-03-1",
            "2024-3-01",
            "+2024-03-01",
            " 2024-03-01",
            "2024-03-01T00:00:00Z",
        ] {
            let err = EntryFilter::day_window(loose).unwrap_err();
            assert_eq!(err, "Invalid date format. Use YYYY-MM-DD", "accepted {:?}", loose);
        }
    }

    #[test]
    fn test_filter_window_is_half_open() {
        let filter = EntryFilter {
            user_id: None,
            created_between: Some(EntryFilter::day_window("2024-03-01").unwrap()),
        };

        let mut e = entry();
        for (ts, expected) in [
            ("2024-02-29T23:59:59Z", false),
            ("2024-03-01T00:00:00Z", true),
            ("2024-03-01T23:59:59Z", true),
            ("2024-03-02T00:00:00Z", false),
        ] {
            e.created_at = at(ts);
            assert_eq!(filter.matches(&e), expected, "created_at {}", ts);
        }
    }

    #[test]
    fn test_filter_by_user() {
        let filter = EntryFilter {
            user_id: Some("ava".to_string()),
            created_between: None,
        };
        let mut e = entry();
        assert!(filter.matches(&e));
        e.user_id = "bob".to_string();
        assert!(!filter.matches(&e));
    }
}
