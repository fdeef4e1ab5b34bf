//! Engine configuration.
//!
//! Defaults suit interactive use; every field can be overridden from the
//! environment (a `.env` file is loaded by the CLI before reading it).
//!
//! | Variable                         | Field                    |
//! |----------------------------------|--------------------------|
//! | `TABULA_HISTORY_LIMIT`           | `history_limit`          |
//! | `TABULA_PARALLEL_ROW_THRESHOLD`  | `parallel_row_threshold` |

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const HISTORY_LIMIT_VAR: &str = "TABULA_HISTORY_LIMIT";
const PARALLEL_THRESHOLD_VAR: &str = "TABULA_PARALLEL_ROW_THRESHOLD";

/// Options for the operation engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of history entries kept; oldest entries are evicted first.
    /// `None` keeps everything.
    pub history_limit: Option<usize>,

    /// Grids with at least this many rows are transformed on the rayon pool
    /// (only with the `parallel` feature).
    pub parallel_row_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: None,
            parallel_row_threshold: 10_000,
        }
    }
}

impl EngineConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(HISTORY_LIMIT_VAR) {
            let limit = parse_usize(HISTORY_LIMIT_VAR, &raw)?;
            // 0 means unlimited
            config.history_limit = (limit > 0).then_some(limit);
        }

        if let Some(raw) = lookup(PARALLEL_THRESHOLD_VAR) {
            config.parallel_row_threshold = parse_usize(PARALLEL_THRESHOLD_VAR, &raw)?;
        }

        Ok(config)
    }
}

fn parse_usize(key: &str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            (HISTORY_LIMIT_VAR, "50"),
            (PARALLEL_THRESHOLD_VAR, " 200 "),
        ]))
        .unwrap();
        assert_eq!(config.history_limit, Some(50));
        assert_eq!(config.parallel_row_threshold, 200);

        let unlimited = EngineConfig::from_lookup(lookup(&[(HISTORY_LIMIT_VAR, "0")])).unwrap();
        assert_eq!(unlimited.history_limit, None);
    }

    #[test]
    fn test_invalid_value() {
        let err = EngineConfig::from_lookup(lookup(&[(HISTORY_LIMIT_VAR, "lots")])).unwrap_err();
        assert!(err.to_string().contains(HISTORY_LIMIT_VAR));
    }
}
