//! Nullable claim API: configurable unclaimed balances and claim grants.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use payout_chain::{ChainError, ClaimAuthorization, ClaimAuthorizationService};
use payout_types::{Address, Credential};

/// A claim API that serves preset unclaimed balances and counts how often
/// a grant is requested per account.
#[derive(Default)]
pub struct NullClaimApi {
    unclaimed: RefCell<HashMap<Address, u64>>,
    requests: RefCell<HashMap<Address, u32>>,
    refuse: RefCell<HashSet<Address>>,
    timestamp: Cell<u64>,
}

impl NullClaimApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unclaimed(&self, address: &Address, amount: u64) {
        self.unclaimed.borrow_mut().insert(address.clone(), amount);
    }

    /// Make grant requests for `address` fail.
    pub fn refuse(&self, address: &Address) {
        self.refuse.borrow_mut().insert(address.clone());
    }

    pub fn accept(&self, address: &Address) {
        self.refuse.borrow_mut().remove(address);
    }

    /// Number of grant requests made for `address`.
    pub fn authorization_requests(&self, address: &Address) -> u32 {
        self.requests.borrow().get(address).copied().unwrap_or(0)
    }
}

impl ClaimAuthorizationService for NullClaimApi {
    async fn unclaimed_balance(&self, address: &Address) -> Result<u64, ChainError> {
        Ok(self.unclaimed.borrow().get(address).copied().unwrap_or(0))
    }

    async fn request_authorization(
        &self,
        address: &Address,
        _credential: &Credential,
    ) -> Result<ClaimAuthorization, ChainError> {
        *self.requests.borrow_mut().entry(address.clone()).or_insert(0) += 1;
        if self.refuse.borrow().contains(address) {
            return Err(ChainError::Api("claim returned HTTP 503".into()));
        }
        // Each grant carries a fresh timestamp so a regenerated grant is detectable.
        self.timestamp.set(self.timestamp.get() + 1);
        Ok(ClaimAuthorization {
            signature: "51".repeat(65),
            amount: self.unclaimed.borrow().get(address).copied().unwrap_or(0),
            timestamp: self.timestamp.get(),
        })
    }
}
