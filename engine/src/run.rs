//! One operator-driven run: claim, then pay out.

use std::time::Duration;

use payout_chain::{ChainClient, ClaimAuthorizationService};
use payout_utils::{ConfirmationPrompt, Delay};
use tracing::{info, warn};

use crate::account::Account;
use crate::claim::{ClaimReport, ClaimWorkflow};
use crate::config::Roster;
use crate::error::EngineError;
use crate::payout::{PayoutReport, PayoutWorkflow};
use crate::sequence::SequenceTracker;
use crate::splitter::FeePolicy;

pub const DEFAULT_EXPLORER_URL: &str = "https://explorer.roninchain.com/tx/";

/// Timing and presentation knobs shared by both workflows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOptions {
    /// Wait between a claim round and its balance check.
    pub claim_settle: Duration,
    /// Wait between a payout round and its sequence check.
    pub payout_settle: Duration,
    /// Pause between consecutive submissions.
    pub pacing: Duration,
    /// Prefix a transaction hash is appended to for log links.
    pub explorer_url: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            claim_settle: Duration::from_secs(30),
            payout_settle: Duration::from_secs(300),
            pacing: Duration::from_millis(250),
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
        }
    }
}

impl RunOptions {
    /// No waiting at all, for tests and dry environments.
    pub fn immediate() -> Self {
        Self {
            claim_settle: Duration::ZERO,
            payout_settle: Duration::ZERO,
            pacing: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunReport {
    pub claims: ClaimReport,
    pub payouts: PayoutReport,
    /// Accounts with nothing to pay out.
    pub skipped: Vec<String>,
    /// Accounts not paid out because their signed claim never confirmed.
    pub held: Vec<String>,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.claims.is_complete() && self.payouts.is_complete()
    }
}

/// Claims every account, then pays out every non-zero balance.
///
/// Payout plans are built only after the claim phase ends, from freshly
/// refreshed balances and sequence numbers.
pub struct PayoutRun<'c, C, A, P, D> {
    chain: &'c C,
    api: &'c A,
    prompt: &'c P,
    delay: &'c D,
    options: RunOptions,
}

impl<'c, C, A, P, D> PayoutRun<'c, C, A, P, D>
where
    C: ChainClient,
    A: ClaimAuthorizationService,
    P: ConfirmationPrompt,
    D: Delay,
{
    pub fn new(chain: &'c C, api: &'c A, prompt: &'c P, delay: &'c D, options: RunOptions) -> Self {
        Self {
            chain,
            api,
            prompt,
            delay,
            options,
        }
    }

    pub async fn execute(&self, roster: &Roster, fee: &FeePolicy) -> Result<RunReport, EngineError> {
        let mut tracker = SequenceTracker::new();

        let claims = ClaimWorkflow::new(self.chain, self.api, self.prompt, self.delay, &self.options);
        let pending = claims.discover(&roster.accounts, &mut tracker).await?;
        let claims = if pending.is_empty() {
            info!("No account has unclaimed tokens.");
            ClaimReport::default()
        } else {
            claims.run(pending, &mut tracker).await
        };
        // A signed claim can still land at the sequence number a payout plan
        // would take as its base, so those accounts sit this run out.
        let mut held = Vec::new();
        for unresolved in &claims.unresolved {
            if unresolved.signed {
                warn!(
                    "Holding payout for '{}': its claim may still be mined. Run again once it settles.",
                    unresolved.account
                );
                held.push(unresolved.account.clone());
            } else {
                warn!(
                    "Claim for '{}' unresolved; paying out its current balance.",
                    unresolved.account
                );
            }
        }
        let in_flight = |account: &Account| {
            claims
                .unresolved
                .iter()
                .any(|c| c.signed && c.address == account.address)
        };
        let payable = roster.accounts.iter().filter(|&a| !in_flight(a));

        let payouts = PayoutWorkflow::new(self.chain, self.prompt, self.delay, &self.options);
        let set = payouts
            .plan(payable, &roster.organization, fee, &mut tracker)
            .await?;

        if set.plans.is_empty() {
            info!("No account has a balance to pay out.");
            return Ok(RunReport {
                claims,
                payouts: PayoutReport::default(),
                skipped: set.skipped,
                held,
            });
        }

        info!("Please review the payouts for the following accounts:");
        for plan in &set.plans {
            plan.preview();
        }

        let payouts = payouts.run(set.plans, &mut tracker).await;
        Ok(RunReport {
            claims,
            payouts,
            skipped: set.skipped,
            held,
        })
    }
}
