//! Ledger configuration.

use serde::{Deserialize, Serialize};

use crate::{AccrualError, Result, constants};

/// Tunables shared by the deal and offering ledgers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Cadence a deal receives when created with a cadence of zero.
    pub default_cadence_secs: u64,
    /// Cadence over which every offering rate accrues.
    pub offering_cadence_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_cadence_secs: constants::DEFAULT_CADENCE_SECS,
            offering_cadence_secs: constants::DEFAULT_OFFERING_CADENCE_SECS,
        }
    }
}

impl LedgerConfig {
    /// Parse and validate a JSON configuration. Missing fields fall back
    /// to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| AccrualError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject zero cadences; accrual divides by them.
    pub fn validate(&self) -> Result<()> {
        if self.default_cadence_secs == 0 {
            return Err(AccrualError::Configuration(
                "default_cadence_secs must be positive".into(),
            ));
        }
        if self.offering_cadence_secs == 0 {
            return Err(AccrualError::Configuration(
                "offering_cadence_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}
