//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::net::SocketAddr;
use wallet_ledger::db::{DatabaseConfig, DatabaseConfigError};

/// Default wallet currency of both providers
pub const DEFAULT_CURRENCY: &str = "INR";

/// Shortest accepted casino signing secret
pub const MIN_CASINO_SECRET_LEN: usize = 16;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration; `None` runs on the in-memory store
    pub database: Option<DatabaseConfig>,
    /// Casino one-wallet configuration
    pub casino: CasinoConfig,
    /// Sportsbook configuration
    pub sportsbook: SportsbookConfig,
    /// Prometheus listener
    pub metrics_bind: Option<SocketAddr>,
}

/// Casino one-wallet provider settings
#[derive(Clone)]
pub struct CasinoConfig {
    /// Shared HMAC secret (required)
    pub secret: String,
    /// Only currency the provider may use
    pub currency: String,
}

impl std::fmt::Debug for CasinoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CasinoConfig")
            .field("secret", &"<redacted>")
            .field("currency", &self.currency)
            .finish()
    }
}

/// Sportsbook provider settings
#[derive(Debug, Clone)]
pub struct SportsbookConfig {
    pub currency: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `memory` - Use the in-memory store instead of PostgreSQL
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
        memory: bool,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_addr_env("SERVER_BIND")?
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8080))),
        };

        let database = if memory {
            None
        } else {
            let config = match database_url_override {
                Some(url) => DatabaseConfig::with_url(url),
                None => DatabaseConfig::from_env(),
            };
            Some(config.map_err(|e| match e {
                DatabaseConfigError::Missing(var) => ConfigError::MissingRequired {
                    var: var.to_string(),
                    hint: "Pass --db-url, or --memory to run without a database".to_string(),
                },
                DatabaseConfigError::Invalid { var, value } => ConfigError::Invalid {
                    var: var.to_string(),
                    reason: format!("{value:?} does not parse"),
                },
            })?)
        };

        let secret = std::env::var("CASINO_SECRET").map_err(|_| ConfigError::MissingRequired {
            var: "CASINO_SECRET".to_string(),
            hint: "Use the secret shared with the casino provider".to_string(),
        })?;

        let config = ServerConfig {
            bind,
            database,
            casino: CasinoConfig {
                secret,
                currency: env_or("CASINO_CURRENCY", DEFAULT_CURRENCY),
            },
            sportsbook: SportsbookConfig {
                currency: env_or("SPORTSBOOK_CURRENCY", DEFAULT_CURRENCY),
            },
            metrics_bind: parse_addr_env("METRICS_BIND")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.casino.secret.len() < MIN_CASINO_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "CASINO_SECRET".to_string(),
                reason: format!("Must be at least {MIN_CASINO_SECRET_LEN} characters"),
            });
        }

        for (var, currency) in [
            ("CASINO_CURRENCY", &self.casino.currency),
            ("SPORTSBOOK_CURRENCY", &self.sportsbook.currency),
        ] {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(ConfigError::Invalid {
                    var: var.to_string(),
                    reason: format!("{currency:?} is not an ISO 4217 code"),
                });
            }
        }

        if let Some(database) = &self.database {
            if database.max_connections < database.min_connections {
                return Err(ConfigError::Invalid {
                    var: "DB_MAX_CONNECTIONS".to_string(),
                    reason: format!(
                        "Must be at least DB_MIN_CONNECTIONS ({})",
                        database.min_connections
                    ),
                });
            }
        }

        if self.metrics_bind == Some(self.bind) {
            return Err(ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: "Must differ from the server bind address".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_addr_env(key: &str) -> Result<Option<SocketAddr>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.parse().map(Some).map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("{value:?} is not an IP:PORT address"),
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ServerConfig {
        ServerConfig {
            bind: "127.0.0.1:8080".parse().unwrap(),
            database: Some(DatabaseConfig::development()),
            casino: CasinoConfig {
                secret: "a".repeat(32),
                currency: "INR".to_string(),
            },
            sportsbook: SportsbookConfig {
                currency: "INR".to_string(),
            },
            metrics_bind: None,
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "CASINO_SECRET".to_string(),
            hint: "Ask the provider".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("CASINO_SECRET"));
        assert!(msg.contains("Ask the provider"));
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = config();
        config.casino.secret = "short".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "CASINO_SECRET"));
    }

    #[test]
    fn test_bad_currency_rejected() {
        let mut config = config();
        config.sportsbook.currency = "rupee".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_bind_must_differ() {
        let mut config = config();
        config.metrics_bind = Some(config.bind);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secret_is_redacted() {
        let rendered = format!("{:?}", config().casino);
        assert!(!rendered.contains(&"a".repeat(32)));
    }
}
