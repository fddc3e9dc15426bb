// Mood entry handlers
// HTTP handlers for listing, creating, updating and deleting journal entries

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    error::ApiError,
    handlers::{parse_id, ApiJson, ApiResponse},
    models::{self, EntryFilter, MoodEntryPayload},
    AppState,
};

/// Query parameters for listing entries
#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    pub user_id: Option<String>,
    /// YYYY-MM-DD
    pub date: Option<String>,
}

impl ListEntriesQuery {
    /// Empty values count as absent.
    pub fn into_filter(self) -> Result<EntryFilter, ApiError> {
        let created_between = match self.date.filter(|d| !d.is_empty()) {
            Some(date) => Some(EntryFilter::day_window(&date).map_err(ApiError::Validation)?),
            None => None,
        };

        Ok(EntryFilter {
            user_id: self.user_id.filter(|u| !u.is_empty()),
            created_between,
        })
    }
}

/// List entries, optionally filtered by owner and by UTC day
/// GET /api/v1/moods/?user_id=<id>&date=<YYYY-MM-DD>
pub async fn list_entries(
    State(state): State<AppState>,
    Query(params): Query<ListEntriesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = params.into_filter()?;
    info!("Listing mood entries with filter: {:?}", filter);

    let entries = state
        .store
        .list_entries(&filter)
        .await
        .map_err(|e| e.or_internal("Failed to retrieve mood entries"))?;

    info!("Retrieved {} mood entries", entries.len());
    Ok((StatusCode::OK, Json(ApiResponse::data(entries))))
}

/// Create an entry owned by the user named in the path
/// POST /api/v1/moods/user/:userId
pub async fn create_entry(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ApiJson(payload): ApiJson<MoodEntryPayload>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id.is_empty() {
        return Err(ApiError::validation("User ID is required"));
    }
    payload.validate_for_create().map_err(ApiError::Validation)?;
    info!("Creating mood entry for user_id: {}", user_id);

    let entry = state
        .store
        .insert_entry(payload.into_new_entry(user_id, models::now()))
        .await
        .map_err(|e| e.or_internal("Failed to create mood entry"))?;

    info!("Successfully created mood entry with id: {}", entry.id);
    Ok((StatusCode::CREATED, Json(ApiResponse::data(entry))))
}

/// Partially update an entry.
/// The lookup happens before the body is inspected, so an unknown id is a 404
/// even when the body is malformed. Fetch and save are separate statements;
/// concurrent updates to one entry are last-write-wins.
/// PUT /api/v1/moods/:id
pub async fn update_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
    body: Result<Json<MoodEntryPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Updating mood entry with id: {}", entry_id);

    let id = parse_id(&entry_id, "Mood entry not found")?;
    let mut entry = state
        .store
        .find_entry(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Mood entry not found"))?;

    let Json(payload) = body?;
    payload.validate_for_update().map_err(ApiError::Validation)?;

    entry.apply_update(payload, models::now());

    let entry = state
        .store
        .save_entry(&entry)
        .await
        .map_err(|e| e.or_internal("Failed to update mood entry"))?;

    info!("Successfully updated mood entry with id: {}", entry.id);
    Ok((StatusCode::OK, Json(ApiResponse::data(entry))))
}

/// Soft-delete an entry
/// DELETE /api/v1/moods/:id
pub async fn delete_entry(
    State(state): State<AppState>,
    Path(entry_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Deleting mood entry with id: {}", entry_id);

    let id = parse_id(&entry_id, "Mood entry not found")?;
    state
        .store
        .find_entry(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Mood entry not found"))?;

    state
        .store
        .soft_delete_entry(id, models::now())
        .await
        .map_err(|e| e.or_internal("Failed to delete mood entry"))?;

    info!("Successfully deleted mood entry with id: {}", id);
    Ok((
        StatusCode::OK,
        Json(ApiResponse::<()>::message("Mood entry deleted successfully")),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(user_id: Option<&str>, date: Option<&str>) -> ListEntriesQuery {
        ListEntriesQuery {
            user_id: user_id.map(str::to_string),
            date: date.map(str::to_string),
        }
    }

    #[test]
    fn test_empty_query_values_are_ignored() {
        let filter = query(Some(""), Some("")).into_filter().unwrap();
        assert_eq!(filter, EntryFilter::default());
    }

    #[test]
    fn test_filters_compose() {
        let filter = query(Some("ava"), Some("2024-03-01")).into_filter().unwrap();
        assert_eq!(filter.user_id.as_deref(), Some("ava"));
        assert!(filter.created_between.is_some());
    }

    #[test]
    fn test_bad_date_is_validation_error() {
        let err = query(None, Some("yesterday")).into_filter().unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
