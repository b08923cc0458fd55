//! Database configuration from environment variables

use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database server host
    pub host: String,

    /// Database server port (default: 3306)
    pub port: u16,

    /// Database name
    pub database: String,

    /// Database user
    pub username: String,

    /// Password; unset or empty triggers an interactive prompt
    pub password: Option<String>,
}

impl StoreConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let host =
            env::var("ENCAL_DB_HOST").context("ENCAL_DB_HOST environment variable not set")?;

        let database =
            env::var("ENCAL_DB_NAME").context("ENCAL_DB_NAME environment variable not set")?;

        let username =
            env::var("ENCAL_DB_USER").context("ENCAL_DB_USER environment variable not set")?;

        let port = env::var("ENCAL_DB_PORT")
            .unwrap_or_else(|_| "3306".to_string())
            .parse()
            .context("Invalid ENCAL_DB_PORT")?;

        let password = env::var("ENCAL_DB_PASS").ok().filter(|p| !p.is_empty());

        Ok(Self {
            host,
            port,
            database,
            username,
            password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them in one test so the
    // default test-thread parallelism cannot interleave them.
    #[test]
    fn config_from_env_with_defaults() {
        env::set_var("ENCAL_DB_HOST", "db.example.com");
        env::set_var("ENCAL_DB_NAME", "encal");
        env::set_var("ENCAL_DB_USER", "operator");
        env::remove_var("ENCAL_DB_PORT");
        env::set_var("ENCAL_DB_PASS", "");

        let config = StoreConfig::from_env().unwrap();

        assert_eq!(config.host, "db.example.com");
        assert_eq!(config.port, 3306);
        assert_eq!(config.database, "encal");
        assert_eq!(config.username, "operator");
        // Empty password means "prompt", not an empty credential.
        assert_eq!(config.password, None);

        env::remove_var("ENCAL_DB_HOST");
        env::remove_var("ENCAL_DB_NAME");
        env::remove_var("ENCAL_DB_USER");
        env::remove_var("ENCAL_DB_PASS");
    }
}
