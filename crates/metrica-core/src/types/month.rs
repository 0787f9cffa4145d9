//! Calendar-month keys and windows.

use crate::error::{Error, Result};
use chrono::{Datelike, Local, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical `YYYY-MM` identifier for a calendar month.
///
/// Internally this is the first day of the month, so ordering is
/// chronological and the key can always produce its own date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey(NaiveDate);

impl MonthKey {
    /// Creates a month key from a year and a 1-based month number.
    ///
    /// # Examples
    ///
    /// ```
    /// use metrica_core::MonthKey;
    ///
    /// let key = MonthKey::new(2024, 2).unwrap();
    /// assert_eq!(key.to_string(), "2024-02");
    /// ```
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=9999).contains(&year) || !(1..=12).contains(&month) {
            return Err(Error::InvalidMonthKey {
                value: format!("{year}-{month}"),
            });
        }
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or_else(|| Error::InvalidMonthKey {
                value: format!("{year}-{month}"),
            })
    }

    /// Returns the key of the month containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    /// Calendar year.
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Calendar month, 1-based.
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// First calendar day of the month.
    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    /// Last calendar day of the month, leap years included.
    pub fn last_day(&self) -> NaiveDate {
        let days = days_in_month(self.year(), self.month());
        self.0.with_day(days).unwrap_or(self.0)
    }

    /// The month immediately before this one.
    pub fn previous(&self) -> Option<Self> {
        self.0.checked_sub_months(Months::new(1)).map(Self)
    }

    /// The month immediately after this one.
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add_months(Months::new(1)).map(Self)
    }

    /// Date range covered by this month.
    pub fn window(&self) -> MonthWindow {
        MonthWindow {
            key: *self,
            start: self.first_day(),
            end: self.last_day(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for MonthKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidMonthKey {
            value: s.to_string(),
        };
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        if !year.chars().chain(month.chars()).all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for MonthKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MonthKey> for String {
    fn from(key: MonthKey) -> Self {
        key.to_string()
    }
}

/// A calendar-month date range used as the filter boundary for one
/// pull-and-compute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthWindow {
    /// Canonical month identifier
    pub key: MonthKey,
    /// First calendar day (inclusive)
    pub start: NaiveDate,
    /// Last calendar day (inclusive)
    pub end: NaiveDate,
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Produces `months_back` consecutive month windows, oldest first, ending
/// with the month before the one containing `today`.
///
/// The in-progress month is never included.
pub fn month_windows(months_back: u32, today: NaiveDate) -> Vec<MonthWindow> {
    let mut keys = Vec::with_capacity(months_back as usize);
    let mut cursor = MonthKey::containing(today).previous();

    while let Some(key) = cursor {
        if keys.len() == months_back as usize {
            break;
        }
        keys.push(key);
        cursor = key.previous();
    }

    keys.reverse();
    keys.iter().map(MonthKey::window).collect()
}

/// [`month_windows`] relative to the local calendar date.
pub fn month_windows_from_now(months_back: u32) -> Vec<MonthWindow> {
    month_windows(months_back, Local::now().date_naive())
}
