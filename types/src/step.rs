//! Payout steps and transaction status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One transfer in an account's payout chain.
///
/// Each step is bound to a fixed offset from the plan's base sequence
/// number; the chain is always executed in `ALL` order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransactionStep {
    /// The player's share.
    Primary,
    /// The organization's share (absorbs the rounding remainder).
    Secondary,
    /// The service fee.
    Fee,
}

impl TransactionStep {
    pub const ALL: [TransactionStep; 3] = [Self::Primary, Self::Secondary, Self::Fee];

    /// Number of transactions in a payout chain.
    pub const COUNT: u64 = 3;

    /// Offset of this step from the plan's base sequence number.
    pub fn offset(self) -> u64 {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
            Self::Fee => 2,
        }
    }

    /// The steps still to run when `done` steps have already landed.
    pub fn remaining(done: u64) -> &'static [TransactionStep] {
        let start = (done as usize).min(Self::ALL.len());
        &Self::ALL[start..]
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Primary => "Scholar payout",
            Self::Secondary => "Academy payout",
            Self::Fee => "Fee payout",
        }
    }
}

impl fmt::Display for TransactionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// On-chain status of a submitted transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
    NotFound,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::NotFound => "not found",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_fixed() {
        let offsets: Vec<u64> = TransactionStep::ALL.iter().map(|s| s.offset()).collect();
        assert_eq!(offsets, vec![0, 1, 2]);
    }

    #[test]
    fn remaining_after_partial_progress() {
        assert_eq!(TransactionStep::remaining(0), &TransactionStep::ALL[..]);
        assert_eq!(
            TransactionStep::remaining(1),
            &[TransactionStep::Secondary, TransactionStep::Fee]
        );
        assert_eq!(TransactionStep::remaining(2), &[TransactionStep::Fee]);
        assert!(TransactionStep::remaining(3).is_empty());
        assert!(TransactionStep::remaining(7).is_empty());
    }
}
