use db_pool::env;
use std::fmt;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::Config(format!(
                "MESSAGE_STORE must be 'postgres' or 'memory', got '{other}'"
            ))),
        }
    }
}

/// Long-poll timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongPollConfig {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for LongPollConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(25_000),
            interval: Duration::from_millis(2_000),
        }
    }
}

impl LongPollConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.interval.is_zero() {
            return Err(AppError::Config(
                "LONG_POLL_INTERVAL_MS must be greater than zero".into(),
            ));
        }
        if self.interval > self.timeout {
            return Err(AppError::Config(
                "LONG_POLL_INTERVAL_MS must not exceed LONG_POLL_TIMEOUT_MS".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Config {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub port: u16,
    pub jwt_secret: String,
    pub long_poll: LongPollConfig,
    pub conversation_page_max: u32,
    pub cors_allowed_origins: Vec<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("store", &self.store)
            .field("database_url", &self.database_url.as_ref().map(|_| "[REDACTED]"))
            .field("port", &self.port)
            .field("jwt_secret", &"[REDACTED]")
            .field("long_poll", &self.long_poll)
            .field("conversation_page_max", &self.conversation_page_max)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

impl Config {
    fn parse_origins(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    /// Read the process environment. Loading `.env` is the binary's job and
    /// happens before this is called.
    pub fn from_env() -> Result<Self, AppError> {
        let store = match env::optional::<String>("MESSAGE_STORE")? {
            Some(value) => StoreBackend::parse(&value)?,
            None => StoreBackend::Postgres,
        };

        let database_url = env::optional::<String>("DATABASE_URL")?;
        if store == StoreBackend::Postgres && database_url.is_none() {
            return Err(AppError::Config("DATABASE_URL missing".into()));
        }

        let jwt_secret: String = env::required("JWT_SECRET")?;
        if jwt_secret.trim().is_empty() {
            return Err(AppError::Config("JWT_SECRET must not be empty".into()));
        }

        let defaults = LongPollConfig::default();
        let long_poll = LongPollConfig {
            timeout: env::optional("LONG_POLL_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
            interval: env::optional("LONG_POLL_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
        };
        long_poll.validate()?;

        let conversation_page_max = env::or_default("CONVERSATION_PAGE_MAX", 500u32)?;
        if conversation_page_max == 0 {
            return Err(AppError::Config(
                "CONVERSATION_PAGE_MAX must be greater than zero".into(),
            ));
        }

        let cors_allowed_origins = Self::parse_origins(&env::or_default(
            "CORS_ALLOWED_ORIGINS",
            String::from("http://localhost:3001"),
        )?);

        Ok(Self {
            store,
            database_url,
            port: env::or_default("PORT", 3000)?,
            jwt_secret,
            long_poll,
            conversation_page_max,
            cors_allowed_origins,
        })
    }

    /// In-memory store with a short long-poll, for handler tests.
    pub fn test_defaults() -> Self {
        Self {
            store: StoreBackend::Memory,
            database_url: None,
            port: 3000,
            jwt_secret: "test-secret-key-for-delivery-service".into(),
            long_poll: LongPollConfig {
                timeout: Duration::from_millis(300),
                interval: Duration::from_millis(50),
            },
            conversation_page_max: 500,
            cors_allowed_origins: vec!["http://localhost:3001".into()],
        }
    }
}
