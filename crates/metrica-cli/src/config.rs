//! Application configuration file.

use metrica_core::{Error, KpiConfig, Result, RunSettings};
use metrica_sources::{CrmSettings, LedgerSettings, MembershipSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "METRICA_CONFIG";

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "metrica.toml";

/// Everything read from the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Lookback, output location and refresh policy
    pub run: RunSettings,
    /// Locations, name mapping, payroll and tenure tables
    pub kpi: KpiConfig,
    /// Ledger endpoint and account selection
    pub ledger: LedgerSettings,
    /// CRM endpoint and property names
    pub crm: CrmSettings,
    /// Membership count source
    pub membership: MembershipSettings,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Replaces `run.output_path`
    pub output_path: Option<PathBuf>,
    /// Replaces `run.months_back`
    pub months_back: Option<u32>,
}

impl AppConfig {
    /// Reads and validates the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        let config = Self::from_toml(&content)?;
        tracing::debug!(
            path = %path.display(),
            locations = config.kpi.locations().len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies command-line overrides and re-validates.
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self> {
        if let Some(path) = overrides.output_path {
            self.run.output_path = path;
        }
        if let Some(months) = overrides.months_back {
            self.run.months_back = months;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks cross-section constraints.
    ///
    /// The `[kpi]` section validates itself on parse; this covers the run
    /// settings and the static membership table's location codes.
    pub fn validate(&self) -> Result<()> {
        self.run.validate()?;

        if self.crm.closed_stage.trim().is_empty() {
            return Err(Error::validation_field("crm.closed_stage", "must not be empty"));
        }
        if self.ledger.spend_account_numbers.is_empty() {
            return Err(Error::validation_field(
                "ledger.spend_account_numbers",
                "at least one spend account is required",
            ));
        }

        self.membership.validate(&self.kpi)
    }
}

/// Resolves the configuration path from the flag, then the default.
pub fn resolve_config_path(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
