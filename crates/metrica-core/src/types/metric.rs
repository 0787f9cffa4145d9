//! Per-location metric maps produced by source adapters.

use super::location::LocationCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One metric for one month, keyed by location.
///
/// Absent keys mean zero. Adapters build a map once with [`MetricMap::add`]
/// or [`FromIterator`] and hand it to the engine, which only reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricMap(BTreeMap<LocationCode, f64>);

impl MetricMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Amount for `location`, zero when absent.
    pub fn get(&self, location: &LocationCode) -> f64 {
        self.0.get(location).copied().unwrap_or(0.0)
    }

    /// Accumulates `amount` onto `location`.
    ///
    /// Zero amounts are not stored so the map stays sparse.
    pub fn add(&mut self, location: LocationCode, amount: f64) {
        if amount == 0.0 {
            return;
        }
        *self.0.entry(location).or_insert(0.0) += amount;
    }

    /// Sum over the given locations.
    pub fn sum_over<'a, I>(&self, locations: I) -> f64
    where
        I: IntoIterator<Item = &'a LocationCode>,
    {
        locations.into_iter().map(|loc| self.get(loc)).sum()
    }

    /// Iterates over stored entries in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&LocationCode, f64)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    /// Number of stored (non-zero) entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no location has activity.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(LocationCode, f64)> for MetricMap {
    fn from_iter<T: IntoIterator<Item = (LocationCode, f64)>>(iter: T) -> Self {
        let mut map = Self::new();
        for (location, amount) in iter {
            map.add(location, amount);
        }
        map
    }
}

impl<const N: usize> From<[(&str, f64); N]> for MetricMap {
    fn from(entries: [(&str, f64); N]) -> Self {
        entries
            .into_iter()
            .map(|(code, amount)| (LocationCode::from(code), amount))
            .collect()
    }
}
