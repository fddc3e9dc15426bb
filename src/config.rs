use std::env;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database: DatabaseConfig,
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub ssl_mode: String,
    /// PEM CA used to verify the server; without it `require` only encrypts
    pub ssl_root_cert: Option<PathBuf>,
    pub max_connections: u32,
    pub connection_timeout: Duration,
}

/// Looks a variable up by name; empty values are reported as missing.
fn read<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    read(lookup, key).with_context(|| format!("{} environment variable is required", key))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = read(&lookup, "APP_PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse::<u16>()
            .context("APP_PORT must be a valid port number")?;

        let database = DatabaseConfig::from_lookup(&lookup)?;

        let static_dir = read(&lookup, "STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./dist"));

        if port == 0 {
            anyhow::bail!("APP_PORT must be greater than 0");
        }

        database.validate()?;

        Ok(Config {
            port,
            database,
            static_dir,
        })
    }
}

impl DatabaseConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = required(lookup, "DB_HOST")?;

        let port = read(lookup, "DB_PORT")
            .unwrap_or_else(|| "5432".to_string())
            .parse::<u16>()
            .context("DB_PORT must be a valid port number")?;

        let username = required(lookup, "DB_USER")?;
        let password = required(lookup, "DB_PASSWORD")?;
        let database = required(lookup, "DB_NAME")?;

        let ssl_mode = read(lookup, "DB_SSL_MODE").unwrap_or_else(|| "require".to_string());
        let ssl_root_cert = read(lookup, "DB_SSL_ROOT_CERT").map(PathBuf::from);

        let max_connections = read(lookup, "DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u32>()
            .context("DB_MAX_CONNECTIONS must be a valid number")?;

        let connection_timeout_secs = read(lookup, "DB_CONNECT_TIMEOUT")
            .unwrap_or_else(|| "30".to_string())
            .parse::<u64>()
            .context("DB_CONNECT_TIMEOUT must be a valid number of seconds")?;

        Ok(DatabaseConfig {
            host,
            port,
            database,
            username,
            password,
            ssl_mode,
            ssl_root_cert,
            max_connections,
            connection_timeout: Duration::from_secs(connection_timeout_secs),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Database port must be greater than 0");
        }

        match self.ssl_mode.as_str() {
            "disable" | "prefer" | "require" => {}
            _ => anyhow::bail!("Invalid SSL mode. Must be one of: disable, prefer, require"),
        }

        if self.max_connections == 0 {
            anyhow::bail!("Max connections must be greater than 0");
        }

        if self.connection_timeout.as_secs() == 0 {
            anyhow::bail!("Connection timeout must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base() -> HashMap<String, String> {
        vars(&[
            ("DB_HOST", "db.internal"),
            ("DB_USER", "postgres"),
            ("DB_PASSWORD", "secret"),
            ("DB_NAME", "moodtracker"),
        ])
    }

    fn load(map: &HashMap<String, String>) -> Result<Config> {
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&base()).expect("config should load");

        assert_eq!(config.port, 3000);
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.ssl_mode, "require");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.static_dir, PathBuf::from("./dist"));
        assert_eq!(config.database.ssl_root_cert, None);
    }

    #[test]
    fn test_overrides() {
        let mut map = base();
        map.insert("DB_PORT".into(), "6543".into());
        map.insert("APP_PORT".into(), "8080".into());
        map.insert("STATIC_DIR".into(), "/srv/www".into());
        map.insert("DB_SSL_ROOT_CERT".into(), "/etc/ssl/rds-ca.pem".into());

        let config = load(&map).expect("config should load");
        assert_eq!(config.database.port, 6543);
        assert_eq!(
            config.database.ssl_root_cert,
            Some(PathBuf::from("/etc/ssl/rds-ca.pem"))
        );
        assert_eq!(config.port, 8080);
        assert_eq!(config.static_dir, PathBuf::from("/srv/www"));
    }

    #[test]
    fn test_required_variables() {
        for key in ["DB_HOST", "DB_USER", "DB_PASSWORD", "DB_NAME"] {
            let mut map = base();
            map.remove(key);
            let err = load(&map).expect_err("missing variable must fail");
            assert!(err.to_string().contains(key), "error should name {}", key);

            // Empty counts as unset
            let mut map = base();
            map.insert(key.to_string(), String::new());
            assert!(load(&map).is_err());
        }
    }

    #[test]
    fn test_invalid_values() {
        let mut map = base();
        map.insert("DB_PORT".into(), "not-a-port".into());
        assert!(load(&map).is_err());

        let mut map = base();
        map.insert("APP_PORT".into(), "0".into());
        assert!(load(&map).is_err());

        let mut map = base();
        map.insert("DB_SSL_MODE".into(), "sometimes".into());
        assert!(load(&map).is_err());
    }
}
