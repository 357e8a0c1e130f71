use crate::db::LEDGER_KEY;
use anyhow::{Context, Result};
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "split-ledger.db";

/// Runtime settings, read from the environment (and `.env`)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub db_path: PathBuf,
    pub storage_key: String,
    pub tolerance_cents: i64,
    /// `EnvFilter` directive; `None` means fall back to `RUST_LOG` / info
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            storage_key: LEDGER_KEY.to_string(),
            tolerance_cents: 1,
            log_filter: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let tolerance_cents = match non_empty("SPLIT_LEDGER_TOLERANCE_CENTS") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|cents| *cents >= 0)
                .with_context(|| format!("SPLIT_LEDGER_TOLERANCE_CENTS must be a non-negative integer, got '{}'", raw))?,
            None => defaults.tolerance_cents,
        };

        Ok(Config {
            db_path: non_empty("SPLIT_LEDGER_DB").map(PathBuf::from).unwrap_or(defaults.db_path),
            storage_key: non_empty("SPLIT_LEDGER_KEY").unwrap_or(defaults.storage_key),
            tolerance_cents,
            log_filter: non_empty("SPLIT_LEDGER_LOG").or_else(|| non_empty("RUST_LOG")),
        })
    }

    /// Log file used while the TUI owns the terminal
    pub fn log_path(&self) -> PathBuf {
        self.db_path.with_extension("log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.storage_key, "budgetingToolTransactions");
        assert_eq!(config.log_path(), PathBuf::from("split-ledger.log"));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("SPLIT_LEDGER_DB", "/tmp/trip.db"),
            ("SPLIT_LEDGER_KEY", "trip"),
            ("SPLIT_LEDGER_TOLERANCE_CENTS", "0"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/trip.db"));
        assert_eq!(config.storage_key, "trip");
        assert_eq!(config.tolerance_cents, 0);
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
    }

    #[test]
    fn test_own_log_filter_wins() {
        let config = config_from(&[("RUST_LOG", "debug"), ("SPLIT_LEDGER_LOG", "warn")]).unwrap();
        assert_eq!(config.log_filter.as_deref(), Some("warn"));
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = config_from(&[("SPLIT_LEDGER_DB", "  "), ("SPLIT_LEDGER_KEY", "")]).unwrap();
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.storage_key, LEDGER_KEY);
    }

    #[test]
    fn test_bad_tolerance() {
        assert!(config_from(&[("SPLIT_LEDGER_TOLERANCE_CENTS", "-1")]).is_err());
        assert!(config_from(&[("SPLIT_LEDGER_TOLERANCE_CENTS", "lots")]).is_err());
    }
}
