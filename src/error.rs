use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tokio_postgres::error::SqlState;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Replaces the message of a 500-class error with one describing the
    /// failed operation. Client errors pass through untouched.
    pub fn or_internal(self, message: &str) -> Self {
        match self {
            ApiError::Database(_) => ApiError::Database(message.to_string()),
            other => other,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classifies a PostgreSQL failure by its SQLSTATE. The only client
    /// error the schema can raise is the partial unique index on users.
    pub fn from_sql_state(code: Option<&SqlState>) -> Self {
        match code {
            Some(&SqlState::UNIQUE_VIOLATION) => {
                ApiError::Conflict("User with this username or email already exists".to_string())
            }
            Some(&SqlState::CONNECTION_EXCEPTION)
            | Some(&SqlState::CONNECTION_DOES_NOT_EXIST)
            | Some(&SqlState::CONNECTION_FAILURE) => {
                ApiError::Database("Database connection unavailable".to_string())
            }
            _ => ApiError::Database("Database operation failed".to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            ApiError::Database(message) => {
                tracing::error!("Request failed with database error: {}", message);
                message
            }
            ApiError::Validation(message) => {
                tracing::debug!("Validation error: {}", message);
                message
            }
            ApiError::NotFound(message) => {
                tracing::debug!("Resource not found: {}", message);
                message
            }
            ApiError::Conflict(message) => {
                tracing::debug!("Constraint conflict: {}", message);
                message
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

// PostgreSQL error mapping
impl From<tokio_postgres::Error> for ApiError {
    fn from(err: tokio_postgres::Error) -> Self {
        let mapped = ApiError::from_sql_state(err.code());
        match mapped {
            ApiError::Conflict(_) => tracing::debug!("Unique constraint violated: {}", err),
            _ => tracing::error!("PostgreSQL error: {} (code: {:?})", err, err.code()),
        }
        mapped
    }
}

// Connection pool error mapping
impl From<deadpool_postgres::PoolError> for ApiError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Backend(inner) => ApiError::from(inner),
            deadpool_postgres::PoolError::Timeout(_) => {
                tracing::warn!("Database connection pool timeout");
                ApiError::Database("Database connection timeout".to_string())
            }
            other => {
                tracing::error!("Database connection pool error: {}", other);
                ApiError::Database("Database connection unavailable".to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        ApiError::Validation("Invalid request body".to_string())
    }
}

/// Failures that end the process: bad configuration, an unreachable or
/// unmigratable database, or the listener itself failing.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("invalid configuration: {0:#}")]
    Config(#[from] anyhow::Error),

    #[error("failed to connect to database: {0}")]
    Connect(ApiError),

    #[error("database migration failed: {0}")]
    Migrate(ApiError),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

// Result type alias for convenience
pub type ApiResult<T> = Result<T, ApiError>;
