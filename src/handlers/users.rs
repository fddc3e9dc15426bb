// User handlers
// HTTP handlers for user registration and lookup

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    error::ApiError,
    handlers::{parse_id, ApiJson, ApiResponse},
    models::{self, CreateUserRequest},
    AppState,
};

/// Query parameters for looking a user up by name
#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: Option<String>,
}

/// Create a new user
/// POST /api/v1/users/
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate().map_err(ApiError::Validation)?;
    info!("Creating new user with username: {}", request.username);

    let user = state
        .store
        .insert_user(request.into_new_user(models::now()))
        .await
        .map_err(|e| e.or_internal("Failed to create user"))?;

    info!("Successfully created user with id: {}", user.id);
    Ok((StatusCode::CREATED, Json(ApiResponse::data(user))))
}

/// Get user by ID
/// GET /api/v1/users/:id
pub async fn get_user_by_id(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Fetching user with id: {}", user_id);

    let id = parse_id(&user_id, "User not found")?;
    let user = state
        .store
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok((StatusCode::OK, Json(ApiResponse::data(user))))
}

/// Get user by username
/// GET /api/v1/users/?username=<name>
pub async fn get_user_by_username(
    State(state): State<AppState>,
    Query(params): Query<UsernameQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let username = params
        .username
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::validation("username is required"))?;
    info!("Fetching user with username: {}", username);

    let user = state
        .store
        .find_user_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok((StatusCode::OK, Json(ApiResponse::data(user))))
}

/// Return the user with this username, creating it first if needed.
/// The email of an existing user is not compared with the request.
/// POST /api/v1/users/create-or-get
pub async fn create_or_get_user(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    request.validate().map_err(ApiError::Validation)?;

    let existing = state
        .store
        .find_user_by_username(&request.username)
        .await
        .map_err(|e| e.or_internal("Failed to look up user"))?;

    if let Some(user) = existing {
        info!("User {} already exists with id: {}", user.username, user.id);
        return Ok((
            StatusCode::OK,
            Json(ApiResponse::data(user).with_message("User already exists")),
        ));
    }

    info!("Creating new user with username: {}", request.username);
    let user = state
        .store
        .insert_user(request.into_new_user(models::now()))
        .await
        // A uniqueness clash here (e.g. email held by another user) is not a 409
        .map_err(|e| match e {
            ApiError::Conflict(_) => ApiError::Database("Failed to create user".to_string()),
            other => other.or_internal("Failed to create user"),
        })?;

    info!("Successfully created user with id: {}", user.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(user).with_message("User created successfully")),
    ))
}
