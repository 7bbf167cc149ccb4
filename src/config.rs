//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Environment variable naming the spool directory.
pub const ENV_SPOOL_DIR: &str = "WORKORDER_SPOOL_DIR";
/// Environment variable naming the index database file.
pub const ENV_DB_PATH: &str = "WORKORDER_DB_PATH";

/// Order daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfig {
    /// Directory holding the order documents.
    pub spool_dir: PathBuf,
    /// Secondary index database file.
    pub db_path: PathBuf,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            spool_dir: PathBuf::from("./data/orders"),
            db_path: PathBuf::from("./data/workorder.db"),
        }
    }
}

impl OrderConfig {
    /// Build from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_SPOOL_DIR) {
            config.spool_dir = non_empty_path(ENV_SPOOL_DIR, dir)?;
        }
        if let Some(path) = lookup(ENV_DB_PATH) {
            config.db_path = non_empty_path(ENV_DB_PATH, path)?;
        }
        Ok(config)
    }
}

fn non_empty_path(key: &str, value: String) -> Result<PathBuf, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(PathBuf::from(value))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = OrderConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, OrderConfig::default());
    }

    #[test]
    fn env_overrides() {
        let config = OrderConfig::from_lookup(lookup(&[
            (ENV_SPOOL_DIR, "/var/spool/orders"),
            (ENV_DB_PATH, "/var/lib/orders.db"),
        ]))
        .unwrap();
        assert_eq!(config.spool_dir, PathBuf::from("/var/spool/orders"));
        assert_eq!(config.db_path, PathBuf::from("/var/lib/orders.db"));
    }

    #[test]
    fn empty_value_rejected() {
        let err = OrderConfig::from_lookup(lookup(&[(ENV_DB_PATH, "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == ENV_DB_PATH));
    }
}
