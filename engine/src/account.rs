//! Accounts taking part in a run.

use payout_types::{Address, Credential};

use crate::splitter::ShareRatio;

/// One game account: where tokens accrue and where the player is paid.
///
/// Loaded once per run and never written back. The account's sequence
/// number lives in the [`SequenceTracker`](crate::SequenceTracker), keyed
/// by `address`.
#[derive(Clone, Debug)]
pub struct Account {
    pub name: String,
    /// The account that earns, claims and pays out.
    pub address: Address,
    /// The player's own payout address.
    pub payout_address: Address,
    pub credential: Credential,
    pub share: ShareRatio,
}
