//! Per-address transaction sequence numbers.

use std::collections::HashMap;

use payout_chain::{ChainClient, ChainError};
use payout_types::Address;

/// The next sequence number each account is expected to use.
///
/// Values come from the chain via [`refresh`](Self::refresh) and are bumped
/// optimistically with [`advance`](Self::advance) once a transaction is
/// believed submitted. The cached value may run ahead of the chain until the
/// next refresh; it is never behind the last value the chain reported.
///
/// Single writer: workflows borrow the tracker mutably for a whole round.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    sequences: HashMap<Address, u64>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query the chain, overwrite the cached value, and return it.
    pub async fn refresh<C: ChainClient>(
        &mut self,
        chain: &C,
        address: &Address,
    ) -> Result<u64, ChainError> {
        let sequence = chain.sequence_number(address).await?;
        if let Some(previous) = self.sequences.insert(address.clone(), sequence) {
            if previous != sequence {
                tracing::debug!(%address, previous, sequence, "sequence refreshed");
            }
        }
        Ok(sequence)
    }

    /// The cached value, without touching the chain.
    pub fn get(&self, address: &Address) -> Option<u64> {
        self.sequences.get(address).copied()
    }

    /// Bump the cached value after a submission. Returns the new value, or
    /// `None` if the address was never refreshed.
    pub fn advance(&mut self, address: &Address) -> Option<u64> {
        let entry = self.sequences.get_mut(address)?;
        *entry += 1;
        Some(*entry)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payout_nullables::NullChain;

    fn addr() -> Address {
        Address::parse("ronin:1111111111111111111111111111111111111111").unwrap()
    }

    #[tokio::test]
    async fn refresh_overwrites_and_get_reads_cache() {
        let chain = NullChain::new();
        let a = addr();
        chain.set_sequence(&a, 7);

        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.get(&a), None);
        assert_eq!(tracker.refresh(&chain, &a).await.unwrap(), 7);
        assert_eq!(tracker.get(&a), Some(7));

        chain.advance_externally(&a, 2);
        assert_eq!(tracker.get(&a), Some(7));
        assert_eq!(tracker.refresh(&chain, &a).await.unwrap(), 9);
        assert_eq!(tracker.get(&a), Some(9));
    }

    #[tokio::test]
    async fn advance_is_optimistic_until_refresh() {
        let chain = NullChain::new();
        let a = addr();
        chain.set_sequence(&a, 3);

        let mut tracker = SequenceTracker::new();
        tracker.refresh(&chain, &a).await.unwrap();
        assert_eq!(tracker.advance(&a), Some(4));
        assert_eq!(tracker.advance(&a), Some(5));

        // The chain never saw those transactions; refresh brings us back.
        assert_eq!(tracker.refresh(&chain, &a).await.unwrap(), 3);
    }

    #[test]
    fn advance_unknown_address_is_none() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.advance(&addr()), None);
        assert!(tracker.is_empty());
    }

    #[tokio::test]
    async fn refresh_error_keeps_cache() {
        let chain = NullChain::new();
        let a = addr();
        chain.set_sequence(&a, 1);
        let mut tracker = SequenceTracker::new();
        tracker.refresh(&chain, &a).await.unwrap();

        chain.fail_sequence_queries(true);
        assert!(tracker.refresh(&chain, &a).await.is_err());
        assert_eq!(tracker.get(&a), Some(1));
    }
}
