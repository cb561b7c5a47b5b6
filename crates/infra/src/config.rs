//! Store configuration read from the environment.

use thiserror::Error;

pub const DATABASE_URL_VAR: &str = "GATEHOUSE_DATABASE_URL";
pub const MAX_CONNECTIONS_VAR: &str = "GATEHOUSE_DB_MAX_CONNECTIONS";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("GATEHOUSE_DB_MAX_CONNECTIONS must be a positive integer, got '{0}'")]
    InvalidMaxConnections(String),
}

/// Which storage backend to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// Process-local store; nothing survives a restart.
    InMemory,
    Postgres { url: String, max_connections: u32 },
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. A missing or blank database URL
    /// selects the in-memory store.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(url) = lookup(DATABASE_URL_VAR).filter(|u| !u.trim().is_empty()) else {
            return Ok(StoreConfig::InMemory);
        };

        let max_connections = match lookup(MAX_CONNECTIONS_VAR) {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidMaxConnections(raw)),
            },
        };

        Ok(StoreConfig::Postgres {
            url: url.trim().to_owned(),
            max_connections,
        })
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, StoreConfig::Postgres { .. })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn no_url_means_in_memory() {
        assert_eq!(StoreConfig::from_lookup(lookup(&[])).unwrap(), StoreConfig::InMemory);
        assert_eq!(
            StoreConfig::from_lookup(lookup(&[(DATABASE_URL_VAR, "  ")])).unwrap(),
            StoreConfig::InMemory
        );
    }

    #[test]
    fn url_with_default_pool_size() {
        let cfg = StoreConfig::from_lookup(lookup(&[(DATABASE_URL_VAR, "postgres://localhost/gh")])).unwrap();
        assert_eq!(
            cfg,
            StoreConfig::Postgres {
                url: "postgres://localhost/gh".into(),
                max_connections: DEFAULT_MAX_CONNECTIONS
            }
        );
        assert!(cfg.is_persistent());
    }

    #[test]
    fn rejects_bad_pool_size() {
        let err = StoreConfig::from_lookup(lookup(&[
            (DATABASE_URL_VAR, "postgres://localhost/gh"),
            (MAX_CONNECTIONS_VAR, "zero"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::InvalidMaxConnections("zero".into()));
    }
}
