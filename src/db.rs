use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, Object, Pool, Runtime};
use native_tls::{Certificate, TlsConnector};
use postgres_native_tls::MakeTlsConnector;
use postgres_types::ToSql;
use tokio_postgres::Row;
use tracing::{error, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{EntryFilter, MoodEntry, NewMoodEntry, NewUser, User};
use crate::store::MoodStore;

const USER_COLUMNS: &str = "id, username, email, created_at, updated_at, deleted_at";
const ENTRY_COLUMNS: &str = "id, user_id, mood_rating, day_highlight, dream_type, dream_notes, \
     sleep_start_time, sleep_end_time, created_at, updated_at, deleted_at";

/// Schema statements, applied in order on every start. Each is idempotent.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "users table",
        r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                username TEXT NOT NULL,
                email TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                deleted_at TIMESTAMPTZ
            )
        "#,
    ),
    (
        "users username index",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username ON users(username) WHERE deleted_at IS NULL",
    ),
    (
        "users email index",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users(email) WHERE deleted_at IS NULL",
    ),
    (
        "users deleted_at index",
        "CREATE INDEX IF NOT EXISTS idx_users_deleted_at ON users(deleted_at)",
    ),
    (
        "mood_entries table",
        r#"
            CREATE TABLE IF NOT EXISTS mood_entries (
                id BIGSERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                mood_rating INTEGER NOT NULL,
                day_highlight TEXT NOT NULL DEFAULT '',
                dream_type TEXT NOT NULL DEFAULT '',
                dream_notes TEXT NOT NULL DEFAULT '',
                sleep_start_time BIGINT NOT NULL DEFAULT 0,
                sleep_end_time BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                deleted_at TIMESTAMPTZ
            )
        "#,
    ),
    (
        "mood_entries deleted_at index",
        "CREATE INDEX IF NOT EXISTS idx_mood_entries_deleted_at ON mood_entries(deleted_at)",
    ),
    (
        "mood_entries user_id index",
        "CREATE INDEX IF NOT EXISTS idx_mood_entries_user_id ON mood_entries(user_id)",
    ),
    (
        "mood_entries created_at index",
        "CREATE INDEX IF NOT EXISTS idx_mood_entries_created_at ON mood_entries(created_at)",
    ),
];

/// PostgreSQL gateway backed by a deadpool connection pool.
/// Built once at startup and shared by every handler through `AppState`.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get(0),
        username: row.get(1),
        email: row.get(2),
        created_at: row.get(3),
        updated_at: row.get(4),
        deleted_at: row.get(5),
    }
}

fn entry_from_row(row: &Row) -> MoodEntry {
    MoodEntry {
        id: row.get(0),
        user_id: row.get(1),
        mood_rating: row.get(2),
        day_highlight: row.get(3),
        dream_type: row.get(4),
        dream_notes: row.get(5),
        sleep_start_time: row.get(6),
        sleep_end_time: row.get(7),
        created_at: row.get(8),
        updated_at: row.get(9),
        deleted_at: row.get(10),
    }
}

/// TLS for every pooled connection.
/// Without a root certificate the link is encrypted but the server is not
/// authenticated, which is what libpq does for `sslmode=require`. With one,
/// the chain and host name are checked against it.
fn tls_connector(root_cert: Option<&Path>) -> Result<TlsConnector, ApiError> {
    let mut builder = TlsConnector::builder();

    match root_cert {
        Some(path) => {
            let pem = std::fs::read(path).map_err(|e| {
                error!("Failed to read SSL root certificate {}: {}", path.display(), e);
                ApiError::Database(format!("Reading SSL root certificate failed: {}", e))
            })?;
            let cert = Certificate::from_pem(&pem).map_err(|e| {
                error!("Invalid SSL root certificate {}: {}", path.display(), e);
                ApiError::Database(format!("Invalid SSL root certificate: {}", e))
            })?;
            builder.add_root_certificate(cert);
        }
        None => {
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
    }

    builder.build().map_err(|e| {
        error!("Failed to create TLS connector: {}", e);
        ApiError::Database(format!("TLS connector creation failed: {}", e))
    })
}

/// WHERE clause for `list_entries`, one `AND` term per filter that is set.
/// Placeholders are numbered in the order parameters are pushed.
fn entry_filter_clause(filter: &EntryFilter) -> (String, Vec<&(dyn ToSql + Sync)>) {
    let mut conditions = vec!["deleted_at IS NULL".to_string()];
    let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();

    if let Some(ref user_id) = filter.user_id {
        params.push(user_id);
        conditions.push(format!("user_id = ${}", params.len()));
    }

    if let Some((ref start, ref end)) = filter.created_between {
        params.push(start);
        conditions.push(format!("created_at >= ${}", params.len()));
        params.push(end);
        conditions.push(format!("created_at < ${}", params.len()));
    }

    (conditions.join(" AND "), params)
}

fn save_entry_query() -> String {
    format!(
        "UPDATE mood_entries SET user_id = $2, mood_rating = $3, day_highlight = $4, \
         dream_type = $5, dream_notes = $6, sleep_start_time = $7, sleep_end_time = $8, \
         created_at = $9, updated_at = $10 \
         WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
        ENTRY_COLUMNS
    )
}

/// Parameters for `save_entry_query`, `$1` first.
fn save_entry_params(entry: &MoodEntry) -> [&(dyn ToSql + Sync); 10] {
    [
        &entry.id,
        &entry.user_id,
        &entry.mood_rating,
        &entry.day_highlight,
        &entry.dream_type,
        &entry.dream_notes,
        &entry.sleep_start_time,
        &entry.sleep_end_time,
        &entry.created_at,
        &entry.updated_at,
    ]
}

impl Database {
    /// Builds the connection pool and proves it works with a `SELECT 1`
    /// round trip before returning. Nothing is retried.
    ///
    /// # Arguments
    /// * `config` - Connection target, credentials, SSL mode and pool size
    ///
    /// # Returns
    /// * `Result<Self, ApiError>` - A ready gateway, or `ApiError::Database`
    ///   when the pool cannot be built or the server cannot be reached
    pub async fn new(config: DatabaseConfig) -> Result<Self, ApiError> {
        info!("Creating PostgreSQL connection pool for host: {}:{}", config.host, config.port);

        let pool = Self::create_pool(config)?;

        let db = Database { pool };
        db.test_connection().await?;

        Ok(db)
    }

    fn create_pool(config: DatabaseConfig) -> Result<Pool, ApiError> {
        let mut pg_config = Config::new();

        pg_config.host = Some(config.host);
        pg_config.port = Some(config.port);
        pg_config.dbname = Some(config.database);
        pg_config.user = Some(config.username);
        pg_config.password = Some(config.password);
        pg_config.connect_timeout = Some(config.connection_timeout);
        // Every session reads and writes timestamps in UTC
        pg_config.options = Some("-c TimeZone=UTC".to_string());

        pg_config.ssl_mode = Some(match config.ssl_mode.as_str() {
            "disable" => deadpool_postgres::SslMode::Disable,
            "prefer" => deadpool_postgres::SslMode::Prefer,
            "require" => deadpool_postgres::SslMode::Require,
            other => {
                warn!("Unknown SSL mode '{}', defaulting to 'require'", other);
                deadpool_postgres::SslMode::Require
            }
        });

        pg_config.manager = Some(deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        });
        pg_config.pool = Some(deadpool_postgres::PoolConfig::new(config.max_connections as usize));

        let tls = MakeTlsConnector::new(tls_connector(config.ssl_root_cert.as_deref())?);

        pg_config.create_pool(Some(Runtime::Tokio1), tls).map_err(|e| {
            error!("Failed to create connection pool: {}", e);
            ApiError::Database(format!("Connection pool creation failed: {}", e))
        })
    }

    async fn get_connection(&self) -> Result<Object, ApiError> {
        self.pool.get().await.map_err(ApiError::from)
    }

    /// Runs `SELECT 1` on a pooled connection.
    ///
    /// # Returns
    /// * `Result<(), ApiError>` - `ApiError::Database` if the round trip fails
    pub async fn test_connection(&self) -> Result<(), ApiError> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[]).await.map_err(|e| {
            error!("Database connection test failed: {}", e);
            ApiError::Database(format!("Connection test failed: {}", e))
        })?;

        info!("Database connection test successful");
        Ok(())
    }

    /// Creates the `users` and `mood_entries` tables and their indexes if
    /// they are missing. Every statement is idempotent, so this runs on each
    /// start; existing data is never altered.
    ///
    /// # Returns
    /// * `Result<(), ApiError>` - `ApiError::Database` naming the first
    ///   statement that failed
    pub async fn migrate(&self) -> Result<(), ApiError> {
        info!("Running database migrations");

        let client = self.get_connection().await?;

        for (name, statement) in MIGRATIONS {
            client.execute(*statement, &[]).await.map_err(|e| {
                error!("Failed to create {}: {}", name, e);
                ApiError::Database(format!("Creating {} failed: {}", name, e))
            })?;
        }

        info!("Database migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl MoodStore for Database {
    /// Inserts a user with the caller's timestamps.
    ///
    /// # Arguments
    /// * `user` - Validated username/email pair with creation timestamps
    ///
    /// # Returns
    /// * `ApiResult<User>` - The stored row; `ApiError::Conflict` when the
    ///   partial unique index on username or email rejects it
    async fn insert_user(&self, user: NewUser) -> ApiResult<User> {
        let client = self.get_connection().await?;

        let query = format!(
            "INSERT INTO users (username, email, created_at, updated_at) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            USER_COLUMNS
        );

        let row = client
            .query_one(
                &query,
                &[&user.username, &user.email, &user.created_at, &user.updated_at],
            )
            .await
            .map_err(ApiError::from)?;

        let created = user_from_row(&row);
        info!("Created user with id: {}", created.id);
        Ok(created)
    }

    /// Looks up a live user by primary key.
    async fn find_user_by_id(&self, id: i64) -> ApiResult<Option<User>> {
        let client = self.get_connection().await?;
        let query = format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        );

        let row = client.query_opt(&query, &[&id]).await.map_err(ApiError::from)?;
        Ok(row.as_ref().map(user_from_row))
    }

    /// Looks up a live user by exact username.
    async fn find_user_by_username(&self, username: &str) -> ApiResult<Option<User>> {
        let client = self.get_connection().await?;
        let query = format!(
            "SELECT {} FROM users WHERE username = $1 AND deleted_at IS NULL ORDER BY id LIMIT 1",
            USER_COLUMNS
        );

        let row = client
            .query_opt(&query, &[&username])
            .await
            .map_err(ApiError::from)?;
        Ok(row.as_ref().map(user_from_row))
    }

    /// Inserts an entry for `entry.user_id`.
    /// The owner is not checked against `users`.
    ///
    /// # Arguments
    /// * `entry` - Validated entry with creation timestamps
    ///
    /// # Returns
    /// * `ApiResult<MoodEntry>` - The stored row, id assigned by `BIGSERIAL`
    async fn insert_entry(&self, entry: NewMoodEntry) -> ApiResult<MoodEntry> {
        let client = self.get_connection().await?;

        let query = format!(
            "INSERT INTO mood_entries (user_id, mood_rating, day_highlight, dream_type, dream_notes, \
             sleep_start_time, sleep_end_time, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            ENTRY_COLUMNS
        );

        let row = client
            .query_one(
                &query,
                &[
                    &entry.user_id,
                    &entry.mood_rating,
                    &entry.day_highlight,
                    &entry.dream_type,
                    &entry.dream_notes,
                    &entry.sleep_start_time,
                    &entry.sleep_end_time,
                    &entry.created_at,
                    &entry.updated_at,
                ],
            )
            .await
            .map_err(ApiError::from)?;

        let created = entry_from_row(&row);
        info!("Created mood entry with id: {}", created.id);
        Ok(created)
    }

    /// Looks up a live entry by primary key.
    async fn find_entry(&self, id: i64) -> ApiResult<Option<MoodEntry>> {
        let client = self.get_connection().await?;
        let query = format!(
            "SELECT {} FROM mood_entries WHERE id = $1 AND deleted_at IS NULL",
            ENTRY_COLUMNS
        );

        let row = client.query_opt(&query, &[&id]).await.map_err(ApiError::from)?;
        Ok(row.as_ref().map(entry_from_row))
    }

    /// Lists live entries matching `filter`.
    ///
    /// # Arguments
    /// * `filter` - Optional owner and optional half-open `created_at` window
    ///
    /// # Returns
    /// * `ApiResult<Vec<MoodEntry>>` - Matches in ascending id order, possibly empty
    async fn list_entries(&self, filter: &EntryFilter) -> ApiResult<Vec<MoodEntry>> {
        let client = self.get_connection().await?;

        let (clause, params) = entry_filter_clause(filter);
        let query = format!(
            "SELECT {} FROM mood_entries WHERE {} ORDER BY id",
            ENTRY_COLUMNS, clause
        );

        let rows = client.query(&query, &params).await.map_err(ApiError::from)?;
        Ok(rows.iter().map(entry_from_row).collect())
    }

    /// Writes every column of `entry` back to its row in one statement.
    ///
    /// # Arguments
    /// * `entry` - A previously fetched entry with fields already merged
    ///
    /// # Returns
    /// * `ApiResult<MoodEntry>` - The row as stored; `ApiError::NotFound` if it
    ///   was soft-deleted since it was fetched
    async fn save_entry(&self, entry: &MoodEntry) -> ApiResult<MoodEntry> {
        let client = self.get_connection().await?;

        let row = client
            .query_opt(&save_entry_query(), &save_entry_params(entry))
            .await
            .map_err(ApiError::from)?;

        match row {
            Some(row) => {
                info!("Updated mood entry with id: {}", entry.id);
                Ok(entry_from_row(&row))
            }
            None => Err(ApiError::not_found("Mood entry not found")),
        }
    }

    /// Stamps `deleted_at`; the row stays in the table.
    async fn soft_delete_entry(&self, id: i64, at: DateTime<Utc>) -> ApiResult<()> {
        let client = self.get_connection().await?;
        let query = "UPDATE mood_entries SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL";

        let rows_affected = client
            .execute(query, &[&id, &at])
            .await
            .map_err(ApiError::from)?;

        if rows_affected == 0 {
            Err(ApiError::not_found("Mood entry not found"))
        } else {
            info!("Soft-deleted mood entry with id: {}", id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn debug_all(params: &[&(dyn ToSql + Sync)]) -> Vec<String> {
        params.iter().map(|p| format!("{:?}", p)).collect()
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        EntryFilter::day_window("2024-03-01").unwrap()
    }

    #[test]
    fn test_filter_clause_without_filters() {
        let filter = EntryFilter::default();
        let (clause, params) = entry_filter_clause(&filter);
        assert_eq!(clause, "deleted_at IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_filter_clause_user_only() {
        let filter = EntryFilter {
            user_id: Some("ava".to_string()),
            created_between: None,
        };
        let (clause, params) = entry_filter_clause(&filter);
        assert_eq!(clause, "deleted_at IS NULL AND user_id = $1");
        assert_eq!(debug_all(&params), vec!["\"ava\""]);
    }

    #[test]
    fn test_filter_clause_date_only() {
        let (start, end) = window();
        let filter = EntryFilter {
            user_id: None,
            created_between: Some((start, end)),
        };
        let (clause, params) = entry_filter_clause(&filter);
        assert_eq!(
            clause,
            "deleted_at IS NULL AND created_at >= $1 AND created_at < $2"
        );
        assert_eq!(
            debug_all(&params),
            vec![format!("{:?}", start), format!("{:?}", end)]
        );
    }

    #[test]
    fn test_filter_clause_user_and_date() {
        let (start, end) = window();
        let filter = EntryFilter {
            user_id: Some("ava".to_string()),
            created_between: Some((start, end)),
        };
        let (clause, params) = entry_filter_clause(&filter);
        assert_eq!(
            clause,
            "deleted_at IS NULL AND user_id = $1 AND created_at >= $2 AND created_at < $3"
        );
        assert_eq!(
            debug_all(&params),
            vec!["\"ava\"".to_string(), format!("{:?}", start), format!("{:?}", end)]
        );
    }

    #[test]
    fn test_save_entry_binds_columns_in_order() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let updated = Utc.with_ymd_and_hms(2024, 3, 2, 9, 30, 0).unwrap();
        let entry = MoodEntry {
            id: 42,
            user_id: "ava".to_string(),
            mood_rating: 7,
            day_highlight: "beach".to_string(),
            dream_type: "lucid".to_string(),
            dream_notes: "flying".to_string(),
            sleep_start_time: 1_700_000_000,
            sleep_end_time: 1_700_028_800,
            created_at: created,
            updated_at: updated,
            deleted_at: None,
        };

        let query = save_entry_query();
        let expected = [
            ("id", "42".to_string()),
            ("user_id", "\"ava\"".to_string()),
            ("mood_rating", "7".to_string()),
            ("day_highlight", "\"beach\"".to_string()),
            ("dream_type", "\"lucid\"".to_string()),
            ("dream_notes", "\"flying\"".to_string()),
            ("sleep_start_time", "1700000000".to_string()),
            ("sleep_end_time", "1700028800".to_string()),
            ("created_at", format!("{:?}", created)),
            ("updated_at", format!("{:?}", updated)),
        ];

        let params = debug_all(&save_entry_params(&entry));
        assert_eq!(params.len(), expected.len());
        for (i, (column, value)) in expected.iter().enumerate() {
            let placeholder = format!("{} = ${}", column, i + 1);
            assert!(query.contains(&placeholder), "missing `{}` in {}", placeholder, query);
            assert_eq!(&params[i], value, "parameter ${} should be {}", i + 1, column);
        }
        assert!(!query.contains("$11"));
        assert!(query.contains("WHERE id = $1 AND deleted_at IS NULL"));
    }

    #[test]
    fn test_tls_without_root_cert_builds() {
        assert!(tls_connector(None).is_ok());
    }

    #[test]
    fn test_tls_root_cert_errors() {
        let missing = Path::new("/nonexistent/rds-ca.pem");
        assert!(matches!(tls_connector(Some(missing)), Err(ApiError::Database(_))));

        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("ca.pem");
        std::fs::write(&garbage, "not a certificate").unwrap();
        assert!(matches!(tls_connector(Some(&garbage)), Err(ApiError::Database(_))));
    }
}
