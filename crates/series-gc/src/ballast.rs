//! Ballast controller
//!
//! The ballast is the byte allowance between cycles. Allocation charges it,
//! freeing credits it back, and exhausting it asks for a cycle. After every
//! regular cycle the allowance is resized so that the next window stays
//! between roughly 10% and 25% of the ballast.
//!
//! The thresholds are a compatibility policy, not a tuned algorithm.

use crate::config::BallastPolicy;

/// Outcome of a post-cycle adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BallastChange {
    /// Consumption was inside the target band
    Unchanged,
    /// Ballast grew from the first value to the second
    Grew(i64, i64),
    /// Ballast shrank from the first value to the second
    Shrank(i64, i64),
}

/// Allocation allowance between cycles.
#[derive(Debug, Clone)]
pub struct Ballast {
    /// Current allowance
    ballast: i64,
    /// Allowance left before a cycle is requested
    remaining: i64,
    /// The allowance never shrinks below this
    floor: i64,
}

impl Ballast {
    /// Start with a full allowance of `ballast` bytes, also used as the floor.
    pub fn new(ballast: usize) -> Self {
        let ballast = ballast as i64;
        Self {
            ballast,
            remaining: ballast,
            floor: ballast,
        }
    }

    /// Current allowance.
    pub fn ballast(&self) -> i64 {
        self.ballast
    }

    /// Allowance left; negative once overdrawn.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Bytes consumed against the current allowance.
    pub fn used(&self) -> i64 {
        self.ballast - self.remaining
    }

    /// Charge an allocation. Returns `true` once the allowance is exhausted.
    #[inline]
    pub fn charge(&mut self, bytes: usize) -> bool {
        self.remaining -= bytes as i64;
        self.remaining <= 0
    }

    /// Credit freed bytes back.
    #[inline]
    pub fn credit(&mut self, bytes: usize) {
        self.remaining += bytes as i64;
    }

    /// Resize the allowance after a regular cycle.
    pub fn adjust(&mut self, policy: &BallastPolicy) -> BallastChange {
        let used = self.used();
        let old = self.ballast;
        let (grow_num, grow_den) = policy.grow_above;
        let (shrink_num, shrink_den) = policy.shrink_below;
        let (resize_num, resize_den) = policy.resize;

        if used > old * grow_num / grow_den {
            self.ballast = used * resize_num / resize_den;
            self.remaining += self.ballast - old;
            BallastChange::Grew(old, self.ballast)
        } else if used < old * shrink_num / shrink_den && old > self.floor {
            self.ballast = (used * resize_num / resize_den).max(self.floor);
            self.remaining -= old - self.ballast;
            BallastChange::Shrank(old, self.ballast)
        } else {
            BallastChange::Unchanged
        }
    }
}
