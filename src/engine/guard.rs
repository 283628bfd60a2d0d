//! Duplicate-approval guard.
//!
//! The approval path creates a review and attempts a burn, neither of which is
//! idempotent. Because delivery is at-least-once and evaluations are
//! stateless, two evaluations can both observe the unpaid-to-paid edge before
//! the paid label becomes visible. This guard admits a given
//! (PR, matched amount) pair exactly once per process, closing that window.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use crate::types::PrNumber;

#[derive(Debug, Default)]
pub struct ApprovalGuard {
    seen: Mutex<HashSet<(PrNumber, i64)>>,
}

impl ApprovalGuard {
    pub fn new() -> ApprovalGuard {
        ApprovalGuard::default()
    }

    /// Returns `true` the first time a key is presented, `false` after.
    ///
    /// `amount_units` is the matched amount in fixed-point base units, so two
    /// distinct payments on the same PR form distinct keys.
    pub fn admit(&self, pr: PrNumber, amount_units: i64) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        seen.insert((pr, amount_units))
    }
}
