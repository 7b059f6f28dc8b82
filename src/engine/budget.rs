//! Global retry failure budget, shared by the coordinator and every worker.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CommandError;

/// Ceiling on failed attempts that are followed by a retry. One instance per run,
/// shared through an `Arc` so serial and parallel dispatch draw from the same budget.
#[derive(Debug)]
pub struct FailureBudget {
    max: u64,
    used: AtomicU64,
}

impl FailureBudget {
    pub fn new(max: u64) -> Self {
        Self {
            max,
            used: AtomicU64::new(0),
        }
    }

    /// Take one unit for a failed attempt of `command`. Returns the units left, or
    /// [`CommandError::BudgetExhausted`] when nothing was left to take.
    pub fn consume(&self, command: &str) -> Result<u64, CommandError> {
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                (used < self.max).then_some(used + 1)
            })
            .map(|prev| self.max - prev - 1)
            .map_err(|_| CommandError::BudgetExhausted {
                command: command.to_string(),
                max: self.max,
            })
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }

    pub fn remaining(&self) -> u64 {
        self.max.saturating_sub(self.used())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}
