//! Run and KPI configuration.
//!
//! The location enumeration, the name → code mapping, the central payroll
//! total and the tenure table are maintained by hand in the configuration
//! file. They are parsed into a [`KpiSettings`] and then validated into an
//! immutable [`KpiConfig`]; nothing downstream sees unvalidated tables.

use crate::error::{Error, Result};
use crate::types::{CORP, LocationCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Default number of most recent months that are always recomputed.
pub const DEFAULT_ALWAYS_REFRESH: usize = 2;

/// Default lookback in months.
pub const DEFAULT_MONTHS_BACK: u32 = 12;

/// `[run]` section: what to compute and where to write it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSettings {
    /// How many completed months to include, ending last month
    #[serde(default = "default_months_back")]
    pub months_back: u32,

    /// Where the dataset is read from and written to
    pub output_path: PathBuf,

    /// How many of the most recent months are recomputed on every run
    #[serde(default = "default_always_refresh")]
    pub always_refresh: usize,
}

fn default_months_back() -> u32 {
    DEFAULT_MONTHS_BACK
}

fn default_always_refresh() -> usize {
    DEFAULT_ALWAYS_REFRESH
}

impl RunSettings {
    /// Checks the run settings.
    pub fn validate(&self) -> Result<()> {
        if self.months_back == 0 {
            return Err(Error::validation_field("months_back", "must be at least 1"));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::validation_field("output_path", "must not be empty"));
        }
        Ok(())
    }
}

/// `[kpi]` section as written in the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KpiSettings {
    /// Location codes in display order (excluding `Corp`)
    pub locations: Vec<LocationCode>,

    /// Fixed monthly central payroll allocated across locations
    #[serde(default)]
    pub central_payroll_monthly: f64,

    /// Upstream location name → location code (may target `Corp`)
    #[serde(default)]
    pub location_names: BTreeMap<String, LocationCode>,

    /// Average membership tenure in months, per location
    #[serde(default)]
    pub avg_tenure_months: BTreeMap<LocationCode, f64>,
}

/// Validated, immutable KPI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "KpiSettings", into = "KpiSettings")]
pub struct KpiConfig {
    locations: Vec<LocationCode>,
    central_payroll_monthly: f64,
    location_names: BTreeMap<String, LocationCode>,
    avg_tenure_months: BTreeMap<LocationCode, f64>,
}

impl TryFrom<KpiSettings> for KpiConfig {
    type Error = Error;

    fn try_from(settings: KpiSettings) -> Result<Self> {
        Self::new(settings)
    }
}

impl From<KpiConfig> for KpiSettings {
    fn from(config: KpiConfig) -> Self {
        KpiSettings {
            locations: config.locations,
            central_payroll_monthly: config.central_payroll_monthly,
            location_names: config.location_names,
            avg_tenure_months: config.avg_tenure_months,
        }
    }
}

impl KpiConfig {
    /// Validates `settings` against its own location enumeration.
    ///
    /// Rejects an empty or duplicated enumeration, a location named `Corp`,
    /// name mappings or tenure entries that target unknown codes, and
    /// negative or non-finite amounts.
    pub fn new(settings: KpiSettings) -> Result<Self> {
        let KpiSettings {
            locations,
            central_payroll_monthly,
            location_names,
            avg_tenure_months,
        } = settings;

        if locations.is_empty() {
            return Err(Error::config("at least one location must be configured"));
        }

        let mut seen = BTreeSet::new();
        for code in &locations {
            if code.is_corp() {
                return Err(Error::config(format!(
                    "'{CORP}' is reserved for central cost and cannot be a location"
                )));
            }
            if code.as_str().trim().is_empty() {
                return Err(Error::config("location codes must not be blank"));
            }
            if !seen.insert(code) {
                return Err(Error::config(format!("duplicate location code '{code}'")));
            }
        }

        if !central_payroll_monthly.is_finite() || central_payroll_monthly < 0.0 {
            return Err(Error::validation_field(
                "central_payroll_monthly",
                "must be a non-negative number",
            ));
        }

        for (name, code) in &location_names {
            if !code.is_corp() && !seen.contains(code) {
                return Err(Error::UnknownLocation {
                    code: format!("{code} (mapped from '{name}')"),
                });
            }
        }

        for (code, months) in &avg_tenure_months {
            if !seen.contains(code) {
                return Err(Error::UnknownLocation {
                    code: code.to_string(),
                });
            }
            if !months.is_finite() || *months < 0.0 {
                return Err(Error::validation_field(
                    format!("avg_tenure_months.{code}"),
                    "must be a non-negative number",
                ));
            }
        }

        Ok(Self {
            locations,
            central_payroll_monthly,
            location_names,
            avg_tenure_months,
        })
    }

    /// Location codes in display order, `Corp` excluded.
    pub fn locations(&self) -> &[LocationCode] {
        &self.locations
    }

    /// Fixed monthly central payroll.
    pub fn central_payroll_monthly(&self) -> f64 {
        self.central_payroll_monthly
    }

    /// Configured tenure for `location`, if any.
    pub fn avg_tenure_months(&self, location: &LocationCode) -> Option<f64> {
        self.avg_tenure_months.get(location).copied()
    }

    /// Returns `true` for a configured location or `Corp`.
    pub fn is_known(&self, code: &LocationCode) -> bool {
        code.is_corp() || self.locations.contains(code)
    }

    /// Checks that `code` is a configured location or `Corp`.
    pub fn ensure_known(&self, code: &LocationCode) -> Result<()> {
        if self.is_known(code) {
            Ok(())
        } else {
            Err(Error::UnknownLocation {
                code: code.to_string(),
            })
        }
    }

    /// Configured upstream name → code pairs.
    pub fn location_names(&self) -> impl Iterator<Item = (&str, &LocationCode)> {
        self.location_names
            .iter()
            .map(|(name, code)| (name.as_str(), code))
    }

    /// Maps an upstream location name to its code.
    ///
    /// The mapping table is consulted first; a name that is itself a known
    /// code maps to that code.
    pub fn resolve_name(&self, name: &str) -> Option<LocationCode> {
        let name = name.trim();
        if let Some(code) = self.location_names.get(name) {
            return Some(code.clone());
        }
        let as_code = LocationCode::from(name);
        self.is_known(&as_code).then_some(as_code)
    }
}
