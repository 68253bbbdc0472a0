//! `mantis-kernel` – motion safety primitives.
//!
//! It does not decide where the robot goes; it decides whether a controller
//! may keep moving it.
//!
//! # Modules
//!
//! - [`motion_lock`] – [`MotionLock`][motion_lock::MotionLock]: at most one
//!   motion-issuing operation at a time.
//! - [`cancel`] – [`CancelToken`][cancel::CancelToken]: cooperative
//!   cancellation polled once per controller iteration.
//! - [`iteration_guard`] – [`IterationGuard`][iteration_guard::IterationGuard]:
//!   iteration and wall-clock budgets that end a non-converging loop.

pub mod cancel;
pub mod iteration_guard;
pub mod motion_lock;

use thiserror::Error;

pub use cancel::CancelToken;
pub use iteration_guard::IterationGuard;
pub use motion_lock::{MotionGuard, MotionLock};

/// Refusals raised by the kernel primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("Motion Busy: held by {held_by}")]
    Busy { held_by: String },

    #[error("Iteration Limit: {iterations} iterations")]
    IterationLimit { iterations: usize },

    #[error("Deadline Exceeded: {elapsed_ms} ms after {iterations} iterations")]
    Deadline { iterations: usize, elapsed_ms: u64 },
}
