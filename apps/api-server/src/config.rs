//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time.

use axum::http::HeaderValue;
use linkedin_verify::VerifyPolicy;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Authentication provider mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthProvider {
    /// Debug mode: accepts X-Debug-User header (DO NOT USE IN PRODUCTION)
    None,
    /// OAuth bearer tokens: Google ID tokens or LinkedIn access tokens
    OAuth,
}

impl AuthProvider {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("oauth") {
            Self::OAuth
        } else {
            Self::None
        }
    }
}

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on restart)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("sqlite") {
            Self::Sqlite
        } else {
            Self::Memory
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Server configuration loaded from environment variables.
///
/// All fields are validated at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 5000)
    pub port: u16,
    /// Authentication provider
    pub auth_provider: AuthProvider,
    /// Google OAuth client ID (required for oauth auth)
    pub google_oauth_client_id: Option<String>,
    /// LinkedIn URL verification policy
    pub verify_policy: VerifyPolicy,
    /// Hard timeout for the verification fetch
    pub verify_timeout: Duration,
    /// CORS allow origin
    pub cors_allow_origin: HeaderValue,
    /// Storage provider
    pub storage_provider: StorageProvider,
    /// SQLite database path (when using sqlite storage)
    #[allow(dead_code)] // Read by SqliteStore::from_env; kept for visibility
    pub db_path: Option<PathBuf>,
    /// Log format
    pub log_format: LogFormat,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// Fails fast on invalid configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);

        let auth_provider =
            AuthProvider::from_str(&env::var("AUTH_PROVIDER").unwrap_or_else(|_| "none".into()));

        let google_oauth_client_id = env::var("GOOGLE_OAUTH_CLIENT_ID").ok();

        if auth_provider == AuthProvider::OAuth && google_oauth_client_id.is_none() {
            return Err(ConfigError {
                field: "GOOGLE_OAUTH_CLIENT_ID",
                message: "Required when AUTH_PROVIDER=oauth".into(),
            });
        }

        let verify_policy_str = env::var("VERIFY_POLICY").unwrap_or_else(|_| "format".into());
        let verify_policy = VerifyPolicy::parse(&verify_policy_str).ok_or_else(|| ConfigError {
            field: "VERIFY_POLICY",
            message: format!("Unknown policy '{verify_policy_str}' (use 'format' or 'fetch')"),
        })?;

        let verify_timeout = env::var("VERIFY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(linkedin_verify::DEFAULT_TIMEOUT);

        let cors_origin_str = env::var("CORS_ALLOW_ORIGIN").unwrap_or_else(|_| "*".into());
        let cors_allow_origin = if cors_origin_str == "*" {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(&cors_origin_str).map_err(|e| ConfigError {
                field: "CORS_ALLOW_ORIGIN",
                message: format!("Invalid header value '{}': {}", cors_origin_str, e),
            })?
        };

        let storage_provider = StorageProvider::from_str(
            &env::var("STORAGE_PROVIDER").unwrap_or_else(|_| "sqlite".into()),
        );

        let db_path = env::var("DB_PATH").ok().map(PathBuf::from);

        let log_format =
            LogFormat::from_str(&env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".into()));

        Ok(Self {
            port,
            auth_provider,
            google_oauth_client_id,
            verify_policy,
            verify_timeout,
            cors_allow_origin,
            storage_provider,
            db_path,
            log_format,
        })
    }

    /// Log warnings about insecure configuration.
    pub fn warn_if_insecure(&self) {
        if self.auth_provider == AuthProvider::None {
            tracing::warn!(
                "AUTH_PROVIDER=none: Using debug authentication via X-Debug-User header. \
                 DO NOT USE IN PRODUCTION."
            );
        }
        if self.verify_policy == VerifyPolicy::TrustOnFormat {
            tracing::info!(
                "VERIFY_POLICY=format: LinkedIn URLs are accepted on format validity alone; \
                 no existence check is performed."
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_provider_parsing() {
        assert_eq!(AuthProvider::from_str("none"), AuthProvider::None);
        assert_eq!(AuthProvider::from_str("NONE"), AuthProvider::None);
        assert_eq!(AuthProvider::from_str("oauth"), AuthProvider::OAuth);
        assert_eq!(AuthProvider::from_str("OAUTH"), AuthProvider::OAuth);
        assert_eq!(AuthProvider::from_str("anything"), AuthProvider::None);
    }

    #[test]
    fn storage_provider_parsing() {
        assert_eq!(StorageProvider::from_str("memory"), StorageProvider::Memory);
        assert_eq!(StorageProvider::from_str("sqlite"), StorageProvider::Sqlite);
        assert_eq!(StorageProvider::from_str("SQLITE"), StorageProvider::Sqlite);
        assert_eq!(StorageProvider::from_str("anything"), StorageProvider::Memory);
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::from_str("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("json"), LogFormat::Json);
        assert_eq!(LogFormat::from_str("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_str("anything"), LogFormat::Pretty);
    }
}
