//! Workspace location identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Code of the pseudo-location that carries central, unallocated cost.
pub const CORP: &str = "Corp";

/// Short code identifying a workspace location, or the `Corp` sentinel.
///
/// Codes are validated against the configured enumeration when the
/// configuration is loaded; this type itself accepts any string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationCode(String);

impl LocationCode {
    /// Creates a location code.
    ///
    /// # Examples
    ///
    /// ```
    /// use metrica_core::LocationCode;
    ///
    /// let code = LocationCode::new("BK");
    /// assert_eq!(code.as_str(), "BK");
    /// assert!(!code.is_corp());
    /// ```
    pub fn new<S: Into<String>>(code: S) -> Self {
        Self(code.into())
    }

    /// The `Corp` sentinel.
    pub fn corp() -> Self {
        Self(CORP.to_string())
    }

    /// Returns `true` if this is the `Corp` sentinel.
    pub fn is_corp(&self) -> bool {
        self.0 == CORP
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LocationCode {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for LocationCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for LocationCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for LocationCode {
    fn borrow(&self) -> &str {
        &self.0
    }
}
