//! Run roster: the accounts to pay out and the organization address.
//!
//! The roster file is JSON:
//!
//! ```json
//! {
//!   "AcademyPayoutAddress": "ronin:…",
//!   "Scholars": [
//!     {
//!       "Name": "Alice",
//!       "AccountAddress": "ronin:…",
//!       "PrivateKey": "0x…",
//!       "ScholarPayoutAddress": "ronin:…",
//!       "ScholarPayoutPercentage": 0.5
//!     }
//!   ]
//! }
//! ```
//!
//! Everything is validated before any network call is made.

use std::collections::HashSet;
use std::path::Path;

use payout_types::{Address, Credential};
use serde::Deserialize;
use thiserror::Error;

use crate::account::Account;
use crate::splitter::ShareRatio;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("share ratio {0} is outside [0, 1]")]
    ShareRatio(String),

    #[error("fee rate {0} bps exceeds 10000")]
    FeeRate(u32),

    #[error("{field} of '{account}': {reason}")]
    Field {
        account: String,
        field: &'static str,
        reason: String,
    },

    #[error("account address {0} appears more than once")]
    DuplicateAccount(Address),

    #[error("invalid organization payout address: {0}")]
    OrganizationAddress(String),

    #[error("roster has no accounts")]
    Empty,

    #[error("invalid roster JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RosterFile {
    academy_payout_address: String,
    #[serde(default)]
    scholars: Vec<ScholarEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ScholarEntry {
    name: String,
    account_address: String,
    private_key: String,
    scholar_payout_address: String,
    scholar_payout_percentage: f64,
}

impl ScholarEntry {
    fn into_account(self) -> Result<Account, ConfigError> {
        let name = self.name.trim().to_string();
        let label = if name.is_empty() {
            self.account_address.clone()
        } else {
            name.clone()
        };
        let field_err = |field: &'static str, reason: String| ConfigError::Field {
            account: label.clone(),
            field,
            reason,
        };

        if name.is_empty() {
            return Err(field_err("Name", "must not be empty".into()));
        }
        let address = Address::parse(&self.account_address)
            .map_err(|e| field_err("AccountAddress", e.to_string()))?;
        let payout_address = Address::parse(&self.scholar_payout_address)
            .map_err(|e| field_err("ScholarPayoutAddress", e.to_string()))?;
        let credential =
            Credential::new(self.private_key).map_err(|e| field_err("PrivateKey", e.to_string()))?;
        let share = ShareRatio::from_fraction(self.scholar_payout_percentage)
            .map_err(|e| field_err("ScholarPayoutPercentage", e.to_string()))?;

        Ok(Account {
            name,
            address,
            payout_address,
            credential,
            share,
        })
    }
}

/// A validated roster.
#[derive(Clone, Debug)]
pub struct Roster {
    /// Receives the organization share of every payout.
    pub organization: Address,
    pub accounts: Vec<Account>,
}

impl Roster {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::from_slice(json.as_bytes())
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        let file: RosterFile = serde_json::from_slice(bytes)?;

        let organization = Address::parse(&file.academy_payout_address)
            .map_err(|e| ConfigError::OrganizationAddress(e.to_string()))?;

        if file.scholars.is_empty() {
            return Err(ConfigError::Empty);
        }

        let mut seen = HashSet::new();
        let mut accounts = Vec::with_capacity(file.scholars.len());
        for entry in file.scholars {
            let account = entry.into_account()?;
            if !seen.insert(account.address.clone()) {
                return Err(ConfigError::DuplicateAccount(account.address));
            }
            accounts.push(account);
        }

        Ok(Self {
            organization,
            accounts,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_slice(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scholar(name: &str, hex_byte: &str, ratio: f64) -> serde_json::Value {
        json!({
            "Name": name,
            "AccountAddress": format!("ronin:{}", hex_byte.repeat(20)),
            "PrivateKey": "0xabc",
            "ScholarPayoutAddress": format!("0x{}", "ee".repeat(20)),
            "ScholarPayoutPercentage": ratio,
        })
    }

    fn roster(scholars: Vec<serde_json::Value>) -> String {
        json!({
            "AcademyPayoutAddress": format!("ronin:{}", "aa".repeat(20)),
            "Scholars": scholars,
        })
        .to_string()
    }

    #[test]
    fn parses_valid_roster() {
        let r = Roster::from_json(&roster(vec![scholar("Alice", "01", 0.7), scholar("Bob", "02", 0.5)]))
            .unwrap();
        assert_eq!(r.accounts.len(), 2);
        assert_eq!(r.accounts[0].name, "Alice");
        assert_eq!(r.accounts[0].share, ShareRatio::from_ppm(700_000).unwrap());
        assert_eq!(r.organization.as_str(), format!("0x{}", "aa".repeat(20)));
    }

    #[test]
    fn fine_grained_ratio_is_kept_as_written() {
        let r = Roster::from_json(&roster(vec![scholar("Alice", "01", 0.1234567)])).unwrap();
        assert_eq!(r.accounts[0].share.to_string(), "0.1234567");
    }

    #[test]
    fn ratio_out_of_range_names_the_account() {
        let err = Roster::from_json(&roster(vec![scholar("Alice", "01", 1.5)])).unwrap_err();
        match err {
            ConfigError::Field { account, field, .. } => {
                assert_eq!(account, "Alice");
                assert_eq!(field, "ScholarPayoutPercentage");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn malformed_address_rejected() {
        let mut s = scholar("Alice", "01", 0.5);
        s["AccountAddress"] = json!("ronin:xyz");
        let err = Roster::from_json(&roster(vec![s])).unwrap_err();
        assert!(matches!(err, ConfigError::Field { field: "AccountAddress", .. }));
    }

    #[test]
    fn duplicate_account_rejected() {
        let err = Roster::from_json(&roster(vec![scholar("A", "01", 0.5), scholar("B", "01", 0.5)]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateAccount(_)));
    }

    #[test]
    fn empty_roster_rejected() {
        assert!(matches!(Roster::from_json(&roster(vec![])), Err(ConfigError::Empty)));
    }

    #[test]
    fn bad_organization_address_rejected() {
        let json = json!({ "AcademyPayoutAddress": "", "Scholars": [scholar("A", "01", 0.5)] });
        assert!(matches!(
            Roster::from_json(&json.to_string()),
            Err(ConfigError::OrganizationAddress(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(&path, roster(vec![scholar("Alice", "01", 0.25)])).unwrap();
        let r = Roster::load(&path).unwrap();
        assert_eq!(r.accounts[0].share, ShareRatio::from_ppm(250_000).unwrap());
        assert!(Roster::load(&dir.path().join("missing.json")).is_err());
    }
}
