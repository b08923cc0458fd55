//! Database client, credential acquisition and connection management

use crate::{DbError, DbResult};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::Row;
use std::time::Duration;
use tracing::{info, warn};

/// Connection attempts retried before the final, error-propagating attempt.
const CONNECT_RETRIES: u32 = 3;

/// Database client wrapping a sqlx connection pool
#[derive(Clone)]
pub struct DbClient {
    pool: MySqlPool,
}

impl DbClient {
    /// Create a new database client from a connection string
    pub async fn new(database_url: &str) -> DbResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a new database client with custom options
    pub async fn with_options(opts: MySqlConnectOptions) -> DbResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(opts)
            .await?;

        Ok(Self { pool })
    }

    /// Connect with bounded retries, then verify by fetching the server
    /// version string.
    ///
    /// Retries up to [`CONNECT_RETRIES`] times with a warning per failure,
    /// then makes one final attempt whose error is the one callers see.
    /// The password is taken from `builder` when set there; otherwise it is
    /// requested from `credentials` once, before any attempt.
    pub async fn connect(
        builder: DbConnectionBuilder,
        credentials: &dyn CredentialSource,
    ) -> DbResult<Self> {
        let host = builder.host_name().to_string();
        let database = builder.database_name().to_string();
        let opts = builder.resolve(credentials)?;

        info!("Connecting to database {} on {}", database, host);

        for attempt in 1..=CONNECT_RETRIES {
            match Self::with_options(opts.clone()).await {
                Ok(client) => return client.verify_version().await,
                Err(e) => {
                    warn!(attempt, %host, %database, error = %e, "connection failed, retrying");
                }
            }
        }

        let client = Self::with_options(opts).await?;
        client.verify_version().await
    }

    /// Fetch and log the server version, consuming the client on failure
    async fn verify_version(self) -> DbResult<Self> {
        let row = sqlx::query("SELECT VERSION()").fetch_one(&self.pool).await?;
        let version: String = row.try_get(0)?;
        info!("Connected to server version: {}", version);
        Ok(self)
    }

    /// Get reference to underlying pool for direct queries
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Test the database connection
    pub async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Source of a database password, separate from connection establishment
/// so non-interactive deployments can inject credentials from configuration.
pub trait CredentialSource: Send + Sync {
    fn password(&self, username: &str) -> DbResult<String>;
}

/// Fixed password supplied by configuration
pub struct StaticCredentials(pub String);

impl CredentialSource for StaticCredentials {
    fn password(&self, _username: &str) -> DbResult<String> {
        Ok(self.0.clone())
    }
}

/// Interactive terminal prompt, input not echoed
pub struct PromptCredentials;

impl CredentialSource for PromptCredentials {
    fn password(&self, username: &str) -> DbResult<String> {
        rpassword::prompt_password(format!("password for {}? ", username))
            .map_err(|e| DbError::ConfigError(format!("password prompt failed: {}", e)))
    }
}

/// Build MySQL connection options from components
pub struct DbConnectionBuilder {
    host: String,
    port: u16,
    database: String,
    username: String,
    password: Option<String>,
}

impl DbConnectionBuilder {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database: database.into(),
            username: "encal".to_string(),
            password: None,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn host_name(&self) -> &str {
        &self.host
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    /// Build connection options, asking `credentials` for a password when
    /// none was configured (an empty configured password also asks).
    pub fn resolve(self, credentials: &dyn CredentialSource) -> DbResult<MySqlConnectOptions> {
        let password = match self.password {
            Some(p) if !p.is_empty() => p,
            _ => credentials.password(&self.username)?,
        };

        Ok(MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_with_configured_password_skips_credential_source() {
        struct NoPrompt;
        impl CredentialSource for NoPrompt {
            fn password(&self, _username: &str) -> DbResult<String> {
                panic!("credential source should not be consulted");
            }
        }

        let opts = DbConnectionBuilder::new("encal")
            .host("db.example.com")
            .port(3307)
            .username("admin")
            .password("secret")
            .resolve(&NoPrompt)
            .unwrap();

        assert_eq!(opts.get_host(), "db.example.com");
        assert_eq!(opts.get_port(), 3307);
    }

    #[test]
    fn builder_with_empty_password_asks_credential_source() {
        let opts = DbConnectionBuilder::new("encal")
            .username("operator")
            .password("")
            .resolve(&StaticCredentials("hunter2".to_string()))
            .unwrap();

        assert_eq!(opts.get_username(), "operator");
    }
}
