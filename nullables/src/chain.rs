//! Nullable chain: an in-memory token ledger with per-account nonces.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};

use payout_chain::{ChainClient, ChainError, ClaimAuthorization, Transfer};
use payout_types::{Address, Credential, TxHash, TxStatus};

/// A transaction the engine handed to the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    Transfer { transfer: Transfer, sequence: u64 },
    Claim { address: Address, amount: u64, sequence: u64 },
}

impl Submission {
    pub fn sequence(&self) -> u64 {
        match self {
            Self::Transfer { sequence, .. } | Self::Claim { sequence, .. } => *sequence,
        }
    }

    pub fn sender(&self) -> &Address {
        match self {
            Self::Transfer { transfer, .. } => &transfer.from,
            Self::Claim { address, .. } => address,
        }
    }
}

#[derive(Clone)]
enum Effect {
    Transfer(Transfer),
    Claim { address: Address, amount: u64 },
}

#[derive(Default)]
struct State {
    sequences: HashMap<Address, u64>,
    balances: HashMap<Address, u64>,
    /// Accepted but not yet mined, keyed by sender then nonce.
    pool: HashMap<Address, BTreeMap<u64, (TxHash, Effect)>>,
    statuses: HashMap<TxHash, TxStatus>,
    submitted: Vec<Submission>,
    /// Submissions at these (sender, nonce) pairs are rejected.
    reject: HashSet<(Address, u64)>,
    /// Senders whose transactions are accepted but never mined.
    frozen: HashSet<Address>,
    fail_sequence_queries: bool,
    /// Sequence queries that still succeed before every later one fails.
    sequence_queries_left: Option<u32>,
    fail_balance_queries: bool,
    next_hash: u64,
}

impl State {
    fn hash(&mut self) -> TxHash {
        self.next_hash += 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&self.next_hash.to_be_bytes());
        TxHash::new(bytes)
    }

    fn accept(&mut self, sender: &Address, sequence: u64, effect: Effect) -> Result<TxHash, ChainError> {
        if self.reject.contains(&(sender.clone(), sequence)) {
            return Err(ChainError::Http(format!(
                "connection reset submitting nonce {sequence} for {sender}"
            )));
        }
        let current = self.sequences.get(sender).copied().unwrap_or(0);
        if sequence < current {
            return Err(ChainError::Rpc {
                code: -32000,
                message: "nonce too low".into(),
            });
        }

        let hash = self.hash();
        let replaced = self
            .pool
            .entry(sender.clone())
            .or_default()
            .insert(sequence, (hash, effect));
        if let Some((old, _)) = replaced {
            self.statuses.insert(old, TxStatus::NotFound);
        }
        self.statuses.insert(hash, TxStatus::Pending);
        self.mine(sender);
        Ok(hash)
    }

    /// Mine every pooled transaction of `sender` that is next in nonce order.
    fn mine(&mut self, sender: &Address) {
        if self.frozen.contains(sender) {
            return;
        }
        loop {
            let current = self.sequences.get(sender).copied().unwrap_or(0);
            let Some((hash, effect)) = self
                .pool
                .get_mut(sender)
                .and_then(|pool| pool.remove(&current))
            else {
                return;
            };
            let status = match effect {
                Effect::Transfer(t) => {
                    let from = self.balances.entry(t.from.clone()).or_insert(0);
                    if *from >= t.amount {
                        *from -= t.amount;
                        *self.balances.entry(t.to.clone()).or_insert(0) += t.amount;
                        TxStatus::Success
                    } else {
                        TxStatus::Failed
                    }
                }
                Effect::Claim { address, amount } => {
                    *self.balances.entry(address).or_insert(0) += amount;
                    TxStatus::Success
                }
            };
            self.statuses.insert(hash, status);
            self.sequences.insert(sender.clone(), current + 1);
        }
    }
}

/// An in-memory chain.
///
/// Transactions are mined immediately when their nonce is next for the
/// sender; later nonces wait in a pool until the gap is filled, and a
/// resubmission at a pooled nonce replaces the pooled transaction.
#[derive(Default)]
pub struct NullChain {
    state: RefCell<State>,
}

impl NullChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sequence(&self, address: &Address, sequence: u64) {
        self.state.borrow_mut().sequences.insert(address.clone(), sequence);
    }

    pub fn set_balance(&self, address: &Address, balance: u64) {
        self.state.borrow_mut().balances.insert(address.clone(), balance);
    }

    pub fn sequence_of(&self, address: &Address) -> u64 {
        self.state.borrow().sequences.get(address).copied().unwrap_or(0)
    }

    pub fn balance_of(&self, address: &Address) -> u64 {
        self.state.borrow().balances.get(address).copied().unwrap_or(0)
    }

    /// Advance an account's nonce as if another program had transacted.
    pub fn advance_externally(&self, address: &Address, by: u64) {
        let mut state = self.state.borrow_mut();
        *state.sequences.entry(address.clone()).or_insert(0) += by;
    }

    /// Reject any submission from `address` at `sequence`.
    pub fn reject_submission(&self, address: &Address, sequence: u64) {
        self.state.borrow_mut().reject.insert((address.clone(), sequence));
    }

    /// Stop rejecting submissions from `address` at `sequence`.
    pub fn allow_submission(&self, address: &Address, sequence: u64) {
        self.state.borrow_mut().reject.remove(&(address.clone(), sequence));
    }

    /// Accept transactions from `address` but leave them unmined.
    pub fn freeze(&self, address: &Address) {
        self.state.borrow_mut().frozen.insert(address.clone());
    }

    /// Resume mining for `address`, mining anything already pooled.
    pub fn unfreeze(&self, address: &Address) {
        let mut state = self.state.borrow_mut();
        state.frozen.remove(address);
        state.mine(address);
    }

    pub fn fail_sequence_queries(&self, fail: bool) {
        self.state.borrow_mut().fail_sequence_queries = fail;
    }

    /// Answer the next `count` sequence queries, then fail all of them.
    pub fn fail_sequence_queries_after(&self, count: u32) {
        self.state.borrow_mut().sequence_queries_left = Some(count);
    }

    pub fn fail_balance_queries(&self, fail: bool) {
        self.state.borrow_mut().fail_balance_queries = fail;
    }

    /// All submissions in order (for assertions).
    pub fn submissions(&self) -> Vec<Submission> {
        self.state.borrow().submitted.clone()
    }

    /// Submissions made by `address`.
    pub fn submissions_from(&self, address: &Address) -> Vec<Submission> {
        self.submissions()
            .into_iter()
            .filter(|s| s.sender() == address)
            .collect()
    }

    pub fn clear_submissions(&self) {
        self.state.borrow_mut().submitted.clear();
    }
}

impl ChainClient for NullChain {
    async fn sequence_number(&self, address: &Address) -> Result<u64, ChainError> {
        let mut state = self.state.borrow_mut();
        if let Some(left) = state.sequence_queries_left {
            state.fail_sequence_queries |= left == 0;
            state.sequence_queries_left = left.checked_sub(1);
        }
        if state.fail_sequence_queries {
            return Err(ChainError::Http("sequence query timed out".into()));
        }
        Ok(state.sequences.get(address).copied().unwrap_or(0))
    }

    async fn token_balance(&self, address: &Address) -> Result<u64, ChainError> {
        let state = self.state.borrow();
        if state.fail_balance_queries {
            return Err(ChainError::Http("balance query timed out".into()));
        }
        Ok(state.balances.get(address).copied().unwrap_or(0))
    }

    async fn submit_transfer(
        &self,
        transfer: &Transfer,
        sequence: u64,
        _credential: &Credential,
    ) -> Result<TxHash, ChainError> {
        let mut state = self.state.borrow_mut();
        state.submitted.push(Submission::Transfer {
            transfer: transfer.clone(),
            sequence,
        });
        state.accept(&transfer.from, sequence, Effect::Transfer(transfer.clone()))
    }

    async fn submit_claim(
        &self,
        address: &Address,
        authorization: &ClaimAuthorization,
        sequence: u64,
        _credential: &Credential,
    ) -> Result<TxHash, ChainError> {
        let mut state = self.state.borrow_mut();
        state.submitted.push(Submission::Claim {
            address: address.clone(),
            amount: authorization.amount,
            sequence,
        });
        let effect = Effect::Claim {
            address: address.clone(),
            amount: authorization.amount,
        };
        state.accept(address, sequence, effect)
    }

    async fn transaction_status(&self, hash: &TxHash) -> Result<TxStatus, ChainError> {
        Ok(self
            .state
            .borrow()
            .statuses
            .get(hash)
            .copied()
            .unwrap_or(TxStatus::NotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::parse(&format!("0x{}", format!("{b:02x}").repeat(20))).unwrap()
    }

    fn key() -> Credential {
        Credential::new("0x01").unwrap()
    }

    #[tokio::test]
    async fn transfer_at_next_nonce_is_mined() {
        let chain = NullChain::new();
        let (a, b) = (addr(1), addr(2));
        chain.set_balance(&a, 100);
        chain.set_sequence(&a, 5);

        let t = Transfer { from: a.clone(), to: b.clone(), amount: 40 };
        let hash = chain.submit_transfer(&t, 5, &key()).await.unwrap();

        assert_eq!(chain.sequence_of(&a), 6);
        assert_eq!(chain.balance_of(&a), 60);
        assert_eq!(chain.balance_of(&b), 40);
        assert_eq!(chain.transaction_status(&hash).await.unwrap(), TxStatus::Success);
    }

    #[tokio::test]
    async fn gapped_nonce_waits_in_pool() {
        let chain = NullChain::new();
        let (a, b) = (addr(1), addr(2));
        chain.set_balance(&a, 100);

        let t = Transfer { from: a.clone(), to: b.clone(), amount: 1 };
        let later = chain.submit_transfer(&t, 1, &key()).await.unwrap();
        assert_eq!(chain.sequence_of(&a), 0);
        assert_eq!(chain.transaction_status(&later).await.unwrap(), TxStatus::Pending);

        chain.submit_transfer(&t, 0, &key()).await.unwrap();
        assert_eq!(chain.sequence_of(&a), 2);
        assert_eq!(chain.transaction_status(&later).await.unwrap(), TxStatus::Success);
    }

    #[tokio::test]
    async fn stale_nonce_is_rejected() {
        let chain = NullChain::new();
        let a = addr(1);
        chain.set_sequence(&a, 3);
        let t = Transfer { from: a.clone(), to: addr(2), amount: 0 };
        assert!(chain.submit_transfer(&t, 2, &key()).await.is_err());
    }

    #[tokio::test]
    async fn rejected_and_frozen_submissions() {
        let chain = NullChain::new();
        let a = addr(1);
        chain.set_balance(&a, 10);
        chain.reject_submission(&a, 0);
        let t = Transfer { from: a.clone(), to: addr(2), amount: 1 };
        assert!(chain.submit_transfer(&t, 0, &key()).await.is_err());
        assert_eq!(chain.submissions().len(), 1);

        chain.allow_submission(&a, 0);
        chain.freeze(&a);
        chain.submit_transfer(&t, 0, &key()).await.unwrap();
        assert_eq!(chain.sequence_of(&a), 0);
        chain.unfreeze(&a);
        assert_eq!(chain.sequence_of(&a), 1);
    }

    #[tokio::test]
    async fn sequence_queries_fail_after_budget() {
        let chain = NullChain::new();
        let a = addr(1);
        chain.set_sequence(&a, 4);
        chain.fail_sequence_queries_after(2);
        assert_eq!(chain.sequence_number(&a).await.unwrap(), 4);
        assert_eq!(chain.sequence_number(&a).await.unwrap(), 4);
        assert!(chain.sequence_number(&a).await.is_err());
        assert!(chain.sequence_number(&a).await.is_err());
        assert_eq!(chain.sequence_of(&a), 4);
    }

    #[tokio::test]
    async fn claim_credits_balance() {
        let chain = NullChain::new();
        let a = addr(1);
        let auth = ClaimAuthorization { signature: "ab".into(), amount: 75, timestamp: 1 };
        chain.submit_claim(&a, &auth, 0, &key()).await.unwrap();
        assert_eq!(chain.balance_of(&a), 75);
        assert_eq!(chain.sequence_of(&a), 1);
    }
}
