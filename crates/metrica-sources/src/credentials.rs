//! Upstream credentials loaded from the environment.
//!
//! All required variables are checked up front and every missing name is
//! reported at once, so a misconfigured deployment fails before any month
//! is processed.

use crate::error::{Result, SourceError};
use std::fmt;

/// Ledger account identifier (substituted into the ledger base URL).
pub const LEDGER_ACCOUNT_VAR: &str = "METRICA_LEDGER_ACCOUNT";
/// Ledger API token.
pub const LEDGER_TOKEN_VAR: &str = "METRICA_LEDGER_TOKEN";
/// CRM private-app token.
pub const CRM_TOKEN_VAR: &str = "METRICA_CRM_TOKEN";
/// Membership API token, only required for the live membership source.
pub const MEMBERSHIP_TOKEN_VAR: &str = "METRICA_MEMBERSHIP_TOKEN";

/// A secret string that never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Identity and tokens for the upstream systems.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Ledger account identifier
    pub ledger_account: String,
    /// Ledger API token
    pub ledger_token: Secret,
    /// CRM access token
    pub crm_token: Secret,
    /// Membership API token, when the live membership source is used
    pub membership_token: Option<Secret>,
}

impl Credentials {
    /// Reads credentials from process environment variables.
    pub fn from_env(require_membership: bool) -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok(), require_membership)
    }

    /// Reads credentials through `lookup`; blank values count as missing.
    pub fn from_lookup<F>(lookup: F, require_membership: bool) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut take = |name: &str| {
            let value = lookup(name).filter(|v| !v.trim().is_empty());
            if value.is_none() {
                missing.push(name.to_string());
            }
            value.unwrap_or_default()
        };

        let ledger_account = take(LEDGER_ACCOUNT_VAR);
        let ledger_token = take(LEDGER_TOKEN_VAR);
        let crm_token = take(CRM_TOKEN_VAR);
        let membership_token = require_membership.then(|| take(MEMBERSHIP_TOKEN_VAR));

        if !missing.is_empty() {
            return Err(SourceError::MissingCredentials { names: missing });
        }

        Ok(Self {
            ledger_account,
            ledger_token: Secret::new(ledger_token),
            crm_token: Secret::new(crm_token),
            membership_token: membership_token.map(Secret::new),
        })
    }
}
