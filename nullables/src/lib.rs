//! Nullable infrastructure for deterministic testing.
//!
//! Every collaborator of the payout engine (chain, claim API, operator
//! prompt, settle delay) is abstracted behind a trait. This crate provides
//! test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically (inject failures, script answers)
//! - Record what was asked of them for assertions
//! - Never touch the network or sleep
//!
//! Usage: swap real implementations for nullables in tests.

pub mod chain;
pub mod claim_api;
pub mod delay;
pub mod prompt;

pub use chain::{NullChain, Submission};
pub use claim_api::NullClaimApi;
pub use delay::NullDelay;
pub use prompt::NullPrompt;
