//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time.

use axum::http::HeaderValue;
use domain::Policy;
use std::env;
use std::fmt;
use std::path::PathBuf;

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

/// Redirect status codes the boundary is willing to emit by default.
const ALLOWED_STATUS_CODES: [u16; 5] = [301, 302, 303, 307, 308];

/// Server configuration loaded from environment variables.
///
/// All fields are validated at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3001)
    pub port: u16,
    /// CORS allow origin
    pub cors_allow_origin: HeaderValue,
    /// Storage provider
    pub storage_provider: StorageProvider,
    /// SQLite database path (when using sqlite storage)
    #[allow(dead_code)] // The adapter reads DB_PATH itself; kept for display
    pub db_path: Option<PathBuf>,
    /// Log format
    pub log_format: LogFormat,
    /// Paths claimed by the application itself; redirects may not shadow them
    pub reserved_routes: Vec<String>,
    /// Engine policy assembled from the REDIRECT_* / policy env vars
    pub policy: Policy,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// Fails fast on invalid configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Port
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3001);

        // CORS allow origin
        let cors_origin_str = env::var("CORS_ALLOW_ORIGIN").unwrap_or_else(|_| "*".into());
        let cors_allow_origin = if cors_origin_str == "*" {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(&cors_origin_str).map_err(|e| ConfigError {
                field: "CORS_ALLOW_ORIGIN",
                message: format!("Invalid header value '{}': {}", cors_origin_str, e),
            })?
        };

        // Storage provider
        let storage_provider = StorageProvider::from_str(
            &env::var("STORAGE_PROVIDER").unwrap_or_else(|_| "sqlite".into()),
        );

        // DB path (for sqlite)
        let db_path = env::var("DB_PATH").ok().map(PathBuf::from);

        // Log format
        let log_format =
            LogFormat::from_str(&env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".into()));

        // Reserved application routes backing the route-checker port
        let reserved_routes = env::var("RESERVED_ROUTES")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Engine policy
        let default_status_code = match env::var("DEFAULT_STATUS_CODE") {
            Ok(s) => {
                let code: u16 = s.parse().map_err(|_| ConfigError {
                    field: "DEFAULT_STATUS_CODE",
                    message: format!("'{}' is not a number", s),
                })?;
                if !ALLOWED_STATUS_CODES.contains(&code) {
                    return Err(ConfigError {
                        field: "DEFAULT_STATUS_CODE",
                        message: format!("{} is not a redirect status code", code),
                    });
                }
                code
            }
            Err(_) => 301,
        };

        let max_chain_length = match env::var("MAX_CHAIN_LENGTH") {
            Ok(s) => {
                let n: usize = s.parse().map_err(|_| ConfigError {
                    field: "MAX_CHAIN_LENGTH",
                    message: format!("'{}' is not a number", s),
                })?;
                if n == 0 {
                    return Err(ConfigError {
                        field: "MAX_CHAIN_LENGTH",
                        message: "must be at least 1".into(),
                    });
                }
                n
            }
            Err(_) => 3,
        };

        let policy = Policy {
            enabled: env_bool("REDIRECTS_ENABLED", true),
            default_status_code,
            require_internal_targets: env_bool("REQUIRE_INTERNAL_TARGETS", true),
            max_chain_length,
            prevent_loops: env_bool("PREVENT_LOOPS", true),
            prevent_collisions_with_routes: env_bool("PREVENT_ROUTE_COLLISIONS", true),
            preserve_utm_params: env_bool("PRESERVE_UTM_PARAMS", true),
        };

        Ok(Self {
            port,
            cors_allow_origin,
            storage_provider,
            db_path,
            log_format,
            reserved_routes,
            policy,
        })
    }

    /// Log warnings about risky configuration.
    pub fn warn_if_insecure(&self) {
        if !self.policy.require_internal_targets {
            tracing::warn!(
                "REQUIRE_INTERNAL_TARGETS=false: redirects may point off-site. \
                 Only do this when every admin is trusted; this is the open-redirect footgun."
            );
        }
        if !self.policy.prevent_loops {
            tracing::warn!("PREVENT_LOOPS=false: loop validation is disabled for new redirects.");
        }
        if !self.policy.enabled {
            tracing::warn!("REDIRECTS_ENABLED=false: resolution is dark; admin API stays up.");
        }
    }
}

/// Boolean env var: unset means `default`, set means truthiness of the value.
fn env_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
