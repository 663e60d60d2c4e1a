//! Process configuration, read once at startup from the environment.

use chrono::Duration;
use thiserror::Error;

/// Signing secrets shorter than this are accepted with a warning.
pub const MIN_SECRET_LEN: usize = 32;

const DEV_SECRET: &str = "roster-in-memory-development-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Upper bound on the access token lifetime (one year).
pub const MAX_TOKEN_TTL_MINUTES: i64 = 60 * 24 * 366;

/// Credentials for the administrator account created at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Immutable runtime settings.
#[derive(Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub secret_key: String,
    pub access_token_ttl: Duration,
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
    pub seed_admin: Option<SeedAdmin>,
    pub use_in_memory_stores: bool,
}

impl core::fmt::Debug for Settings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Settings")
            .field("database_configured", &self.database_url.is_some())
            .field("access_token_ttl", &self.access_token_ttl)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_prefix", &self.api_prefix)
            .field("seed_admin", &self.seed_admin)
            .field("use_in_memory_stores", &self.use_in_memory_stores)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Load from the process environment, honouring a `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let use_in_memory_stores = match get("USE_IN_MEMORY_STORES") {
            Some(v) => parse_bool("USE_IN_MEMORY_STORES", &v)?,
            None => false,
        };

        let database_url = get("DATABASE_URL");
        if database_url.is_none() && !use_in_memory_stores {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let secret_key = match get("SECRET_KEY") {
            Some(secret) => secret,
            None if use_in_memory_stores => {
                tracing::warn!("SECRET_KEY not set; using the built-in development secret");
                DEV_SECRET.to_string()
            }
            None => return Err(ConfigError::Missing("SECRET_KEY")),
        };
        if secret_key.len() < MIN_SECRET_LEN {
            tracing::warn!(
                length = secret_key.len(),
                "SECRET_KEY is shorter than {MIN_SECRET_LEN} bytes"
            );
        }

        let ttl_minutes: i64 = parse_or("ACCESS_TOKEN_EXPIRE_MINUTES", get("ACCESS_TOKEN_EXPIRE_MINUTES"), 720)?;
        if !(1..=MAX_TOKEN_TTL_MINUTES).contains(&ttl_minutes) {
            return Err(ConfigError::Invalid {
                key: "ACCESS_TOKEN_EXPIRE_MINUTES",
                message: format!("must be between 1 and {MAX_TOKEN_TTL_MINUTES}"),
            });
        }

        let seed_admin = match (get("ADMIN_USERNAME"), get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(username), Some(email), Some(password)) => Some(SeedAdmin {
                username,
                email,
                password,
            }),
            (None, None, None) => None,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "ADMIN_USERNAME",
                    message: "ADMIN_USERNAME, ADMIN_EMAIL and ADMIN_PASSWORD must be set together"
                        .to_string(),
                });
            }
        };

        Ok(Self {
            database_url,
            secret_key,
            access_token_ttl: Duration::minutes(ttl_minutes),
            host: get("DEFAULT_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("DEFAULT_PORT", get("DEFAULT_PORT"), 8080)?,
            api_prefix: normalize_prefix(get("API_PREFIX").as_deref().unwrap_or("/api/v1")),
            seed_admin,
            use_in_memory_stores,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: core::fmt::Display,
{
    match value {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

/// `"api/v1/"` → `"/api/v1"`; an empty prefix or `"/"` becomes `""`.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
