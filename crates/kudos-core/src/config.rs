//! Ledger configuration.

use anyhow::Context;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunable ledger parameters, loaded from YAML.
///
/// Every field has a default so an empty file (or no file) is valid.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Minutes a submitted transfer stays open to controller review
    /// before the sweep auto-approves it. Default: one day.
    pub grace_period_minutes: i64,

    /// Points credited to each active member's distribution account
    /// when a period opens.
    pub distribution_amount: i64,

    /// Optional hard cap on a single transfer amount.
    pub max_transfer: Option<i64>,

    /// Seconds between sweeps when running the background sweeper.
    pub sweep_interval_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            grace_period_minutes: 1440,
            distribution_amount: 50,
            max_transfer: None,
            sweep_interval_secs: 60,
        }
    }
}

impl LedgerConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: LedgerConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.grace_period_minutes < 0 {
            return Err(format!(
                "grace_period_minutes must not be negative (got {})",
                self.grace_period_minutes
            ));
        }
        if self.distribution_amount <= 0 {
            return Err(format!(
                "distribution_amount must be positive (got {})",
                self.distribution_amount
            ));
        }
        if let Some(cap) = self.max_transfer {
            if cap <= 0 {
                return Err(format!("max_transfer must be positive (got {})", cap));
            }
        }
        if self.sweep_interval_secs == 0 {
            return Err("sweep_interval_secs must be positive".to_string());
        }
        Ok(())
    }

    /// Grace window as a chrono duration.
    pub fn grace_period(&self) -> Duration {
        Duration::minutes(self.grace_period_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grace_period_minutes, 1440);
        assert_eq!(config.distribution_amount, 50);
        assert_eq!(config.max_transfer, None);
    }

    #[test]
    fn empty_yaml_yields_defaults() {
        let config: LedgerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, LedgerConfig::default());
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let config: LedgerConfig =
            serde_yaml::from_str("grace_period_minutes: 10\nmax_transfer: 100").unwrap();
        assert_eq!(config.grace_period_minutes, 10);
        assert_eq!(config.max_transfer, Some(100));
        assert_eq!(config.distribution_amount, 50);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad = [
            LedgerConfig {
                grace_period_minutes: -1,
                ..LedgerConfig::default()
            },
            LedgerConfig {
                distribution_amount: 0,
                ..LedgerConfig::default()
            },
            LedgerConfig {
                max_transfer: Some(0),
                ..LedgerConfig::default()
            },
            LedgerConfig {
                sweep_interval_secs: 0,
                ..LedgerConfig::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn load_reads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kudos.yaml");
        std::fs::write(&path, "distribution_amount: 120\n").unwrap();

        let config = LedgerConfig::load(&path).unwrap();
        assert_eq!(config.distribution_amount, 120);

        std::fs::write(&path, "distribution_amount: -3\n").unwrap();
        assert!(LedgerConfig::load(&path).is_err());
    }
}
