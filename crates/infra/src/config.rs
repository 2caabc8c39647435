//! Process configuration loaded from environment variables.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `FOLIO_BIND_ADDR` | `0.0.0.0:8080` | HTTP listen address |
//! | `FOLIO_MAX_APPEND_ATTEMPTS` | `3` | Dispatch attempts before a conflict is surfaced (>= 1) |
//! | `FOLIO_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `USE_PERSISTENT_STORES` | `false` | Use Postgres instead of the in-memory store |
//! | `DATABASE_URL` | none | Required when `USE_PERSISTENT_STORES=true` |

use std::net::SocketAddr;

use thiserror::Error;

use folio_observability::LogFormat;

use crate::command_dispatcher::DEFAULT_MAX_ATTEMPTS;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Where events are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    InMemory,
    Postgres { database_url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolioConfig {
    pub bind_addr: SocketAddr,
    pub max_append_attempts: u32,
    pub log_format: LogFormat,
    pub storage: StorageConfig,
}

impl FolioConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("FOLIO_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: "FOLIO_BIND_ADDR",
                reason: e.to_string(),
            })?;

        let max_append_attempts = match lookup("FOLIO_MAX_APPEND_ATTEMPTS") {
            None => DEFAULT_MAX_ATTEMPTS,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n >= 1 => n,
                Ok(_) => {
                    return Err(ConfigError::Invalid {
                        var: "FOLIO_MAX_APPEND_ATTEMPTS",
                        reason: "must be at least 1".to_string(),
                    });
                }
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: "FOLIO_MAX_APPEND_ATTEMPTS",
                        reason: e.to_string(),
                    });
                }
            },
        };

        let log_format = match lookup("FOLIO_LOG_FORMAT") {
            None => LogFormat::default(),
            Some(raw) => raw.parse::<LogFormat>().map_err(|e| ConfigError::Invalid {
                var: "FOLIO_LOG_FORMAT",
                reason: e.to_string(),
            })?,
        };

        let use_persistent = match lookup("USE_PERSISTENT_STORES") {
            None => false,
            Some(raw) => raw.trim().parse::<bool>().map_err(|e| ConfigError::Invalid {
                var: "USE_PERSISTENT_STORES",
                reason: e.to_string(),
            })?,
        };

        let storage = if use_persistent {
            let database_url = lookup("DATABASE_URL")
                .filter(|url| !url.trim().is_empty())
                .ok_or(ConfigError::Missing("DATABASE_URL"))?;
            StorageConfig::Postgres { database_url }
        } else {
            StorageConfig::InMemory
        };

        Ok(Self {
            bind_addr,
            max_append_attempts,
            log_format,
            storage,
        })
    }
}
