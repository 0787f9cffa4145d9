//! The persisted KPI dataset.
//!
//! A [`Dataset`] is the only artifact Metrica writes. It is loaded at the
//! start of a run as the baseline for incremental refresh and replaced in
//! full at the end of the run.

use super::kpi::KpiRecord;
use super::location::LocationCode;
use super::month::MonthKey;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// KPI records for every location plus the aggregate, for one month.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthSnapshot {
    /// Per-location records
    pub locations: BTreeMap<LocationCode, KpiRecord>,
    /// Aggregate record
    pub totals: KpiRecord,
}

/// Per-location, per-month KPI table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// When the dataset was last written
    pub last_updated: DateTime<Utc>,
    /// Month keys present in `data`, oldest first
    pub months: Vec<MonthKey>,
    /// Location codes in display order
    pub locations: Vec<LocationCode>,
    /// month → location → KPIs
    pub data: BTreeMap<MonthKey, BTreeMap<LocationCode, KpiRecord>>,
    /// month → aggregate KPIs
    pub totals: BTreeMap<MonthKey, KpiRecord>,
}

impl Default for Dataset {
    fn default() -> Self {
        Self::empty()
    }
}

impl Dataset {
    /// A dataset with no months.
    pub fn empty() -> Self {
        Self {
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
            months: Vec::new(),
            locations: Vec::new(),
            data: BTreeMap::new(),
            totals: BTreeMap::new(),
        }
    }

    /// Returns `true` if `data` holds a record for `month`.
    pub fn contains_month(&self, month: &MonthKey) -> bool {
        self.data.contains_key(month)
    }

    /// Copies out everything stored for `month`.
    ///
    /// A month with location data but no totals entry yields default
    /// (all-undefined) totals.
    pub fn snapshot(&self, month: &MonthKey) -> Option<MonthSnapshot> {
        let locations = self.data.get(month)?.clone();
        let totals = self.totals.get(month).cloned().unwrap_or_default();
        Some(MonthSnapshot { locations, totals })
    }

    /// Loads a dataset from `path`.
    ///
    /// Returns `Ok(None)` if the file doesn't exist.
    /// Returns `Err` if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        let dataset: Self = serde_json::from_str(&content)?;
        Ok(Some(dataset))
    }

    /// Loads the baseline for a run.
    ///
    /// A missing or unreadable file is not fatal: the run starts from an
    /// empty baseline and recomputes every month.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(Some(dataset)) => {
                tracing::info!(
                    path = %path.display(),
                    months = dataset.months.len(),
                    "Loaded baseline dataset"
                );
                dataset
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "No baseline dataset, starting empty");
                Self::empty()
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Baseline dataset unreadable, starting empty"
                );
                Self::empty()
            }
        }
    }

    /// Writes the dataset to `path`, replacing any existing file.
    ///
    /// The JSON is written to a temporary file in the same directory and
    /// renamed into place, so readers never observe a partial file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| Error::io_with_path(e, dir))?;

        let content = serde_json::to_string_pretty(self)?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io_with_path(e, dir))?;
        tmp.write_all(content.as_bytes())
            .and_then(|()| target_permissions(path, tmp.as_file()))
            .and_then(|permissions| tmp.as_file().set_permissions(permissions))
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| Error::io_with_path(e, tmp.path()))?;
        tmp.persist(path)
            .map_err(|e| Error::io_with_path(e.error, path))?;

        tracing::debug!(path = %path.display(), bytes = content.len(), "Dataset written");
        Ok(())
    }
}

/// Permissions for the replacement file: those of the file being replaced,
/// else world-readable. Temporary files are created owner-only.
fn target_permissions(path: &Path, tmp: &fs::File) -> io::Result<fs::Permissions> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let mut permissions = tmp.metadata()?.permissions();
            set_shared(&mut permissions);
            Ok(permissions)
        }
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn set_shared(permissions: &mut fs::Permissions) {
    use std::os::unix::fs::PermissionsExt;
    permissions.set_mode(0o644);
}

#[cfg(not(unix))]
fn set_shared(permissions: &mut fs::Permissions) {
    permissions.set_readonly(false);
}
