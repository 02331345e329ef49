//! Run statistics
//!
//! Counters are diagnostic only; nothing in the engine reads them back.

use serde::{Deserialize, Serialize};

/// Counters for synchronization passes and their side effects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Ready-queue entries processed
    pub steps: u64,
    /// Steps that paired a sender with a reader
    pub synchronizations: u64,
    /// Steps whose pairing had been cancelled in the meantime
    pub null_steps: u64,
    /// Offers withdrawn by choice commits
    pub cancellations: u64,
    /// Continuations forked by replicating sequences
    pub replicas_forked: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_synchronization(&mut self) {
        self.synchronizations += 1;
    }

    pub(crate) fn record_null_step(&mut self) {
        self.null_steps += 1;
    }

    pub(crate) fn record_cancellation(&mut self) {
        self.cancellations += 1;
    }

    pub(crate) fn record_fork(&mut self) {
        self.replicas_forked += 1;
    }

    /// Counters accumulated since `earlier` was taken
    pub fn since(&self, earlier: &RunStats) -> RunStats {
        RunStats {
            steps: self.steps.saturating_sub(earlier.steps),
            synchronizations: self.synchronizations.saturating_sub(earlier.synchronizations),
            null_steps: self.null_steps.saturating_sub(earlier.null_steps),
            cancellations: self.cancellations.saturating_sub(earlier.cancellations),
            replicas_forked: self.replicas_forked.saturating_sub(earlier.replicas_forked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since() {
        let mut stats = RunStats::new();
        stats.steps = 3;
        stats.record_synchronization();
        let snapshot = stats;

        stats.steps += 2;
        stats.record_synchronization();
        stats.record_null_step();
        stats.record_cancellation();
        stats.record_fork();

        let delta = stats.since(&snapshot);
        assert_eq!(
            delta,
            RunStats {
                steps: 2,
                synchronizations: 1,
                null_steps: 1,
                cancellations: 1,
                replicas_forked: 1,
            }
        );
    }
}
