//! [`IterationGuard`] – bounds on convergence loops.
//!
//! A feedback loop that never converges (an unreachable heading, a target
//! that keeps drifting, a sensor stuck on a stale value) must not drive the
//! base forever.  Each loop calls [`IterationGuard::tick`] once per
//! iteration; the guard fails once either the iteration budget or the
//! wall-clock budget is spent.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use mantis_kernel::{IterationGuard, KernelError};
//!
//! let mut guard = IterationGuard::new(2, Duration::from_secs(60));
//!
//! assert_eq!(guard.tick(), Ok(1));
//! assert_eq!(guard.tick(), Ok(2));
//! assert!(matches!(guard.tick(), Err(KernelError::IterationLimit { iterations: 2 })));
//! ```

use std::time::{Duration, Instant};

use crate::KernelError;

// ─────────────────────────────────────────────────────────────────────────────
// IterationGuard
// ─────────────────────────────────────────────────────────────────────────────

/// Iteration and wall-clock budget for one controller run.
#[derive(Debug, Clone)]
pub struct IterationGuard {
    max_iterations: usize,
    max_duration: Duration,
    started: Instant,
    iterations: usize,
}

impl IterationGuard {
    /// Start a guard allowing `max_iterations` ticks within `max_duration`.
    pub fn new(max_iterations: usize, max_duration: Duration) -> Self {
        Self {
            max_iterations,
            max_duration,
            started: Instant::now(),
            iterations: 0,
        }
    }

    /// Count one iteration.
    ///
    /// Returns the 1-based iteration number, or an error once the budget is
    /// exhausted.  The failing tick is not counted.
    pub fn tick(&mut self) -> Result<usize, KernelError> {
        if self.iterations >= self.max_iterations {
            return Err(KernelError::IterationLimit {
                iterations: self.iterations,
            });
        }
        self.check_deadline()?;
        self.iterations += 1;
        Ok(self.iterations)
    }

    /// Fail once the wall-clock budget is spent, without counting an
    /// iteration.  For loops that wait on an external source between ticks.
    pub fn check_deadline(&self) -> Result<(), KernelError> {
        let elapsed = self.started.elapsed();
        if elapsed > self.max_duration {
            return Err(KernelError::Deadline {
                iterations: self.iterations,
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }
        Ok(())
    }

    /// Iterations counted so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Restart both budgets.
    pub fn reset(&mut self) {
        self.started = Instant::now();
        self.iterations = 0;
    }
}
