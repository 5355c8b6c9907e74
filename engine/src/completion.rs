//! Progress classification from sequence-number deltas.
//!
//! A chain of `steps` transactions planned at `base` uses sequence numbers
//! `base..base + steps`. Since each landed transaction advances the
//! account's sequence by exactly one, `actual - base` is the number of
//! landed steps, provided nothing else transacted from the account.

use crate::error::SequenceAnomaly;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    NotStarted,
    Partial { steps_done: u64 },
    Complete,
}

impl Completion {
    pub fn steps_done(&self, steps: u64) -> u64 {
        match self {
            Self::NotStarted => 0,
            Self::Partial { steps_done } => *steps_done,
            Self::Complete => steps,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// Classify a chain of `steps` transactions planned at `base` given the
/// account's `actual` sequence number.
///
/// `actual < base` and `actual > base + steps` are anomalies: the chain's
/// sequence is monotonic, and this run is the only expected sender.
pub fn classify(base: u64, steps: u64, actual: u64) -> Result<Completion, SequenceAnomaly> {
    let expected = base.saturating_add(steps);
    if actual < base {
        return Err(SequenceAnomaly::Regressed { base, actual });
    }
    if actual > expected {
        return Err(SequenceAnomaly::Overshot { expected, actual });
    }
    Ok(match actual - base {
        0 => Completion::NotStarted,
        done if done == steps => Completion::Complete,
        steps_done => Completion::Partial { steps_done },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_when_all_steps_landed() {
        assert_eq!(classify(10, 3, 13), Ok(Completion::Complete));
    }

    #[test]
    fn partial_reports_steps_done() {
        assert_eq!(classify(10, 3, 11), Ok(Completion::Partial { steps_done: 1 }));
        assert_eq!(classify(10, 3, 12), Ok(Completion::Partial { steps_done: 2 }));
    }

    #[test]
    fn not_started_when_unchanged() {
        assert_eq!(classify(10, 3, 10), Ok(Completion::NotStarted));
    }

    #[test]
    fn regression_is_an_anomaly() {
        assert_eq!(
            classify(10, 3, 9),
            Err(SequenceAnomaly::Regressed { base: 10, actual: 9 })
        );
    }

    #[test]
    fn overshoot_is_an_anomaly() {
        assert_eq!(
            classify(10, 3, 14),
            Err(SequenceAnomaly::Overshot { expected: 13, actual: 14 })
        );
    }

    #[test]
    fn single_step_chain() {
        assert_eq!(classify(4, 1, 4), Ok(Completion::NotStarted));
        assert_eq!(classify(4, 1, 5), Ok(Completion::Complete));
    }

    #[test]
    fn steps_done_per_variant() {
        assert_eq!(Completion::NotStarted.steps_done(3), 0);
        assert_eq!(Completion::Partial { steps_done: 2 }.steps_done(3), 2);
        assert_eq!(Completion::Complete.steps_done(3), 3);
    }
}
