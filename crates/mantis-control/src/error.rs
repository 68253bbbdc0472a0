//! Controller errors and terminal statuses.

use mantis_kernel::KernelError;
use mantis_types::MantisError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result of a controller operation.
pub type ControlResult<T> = Result<T, ControlError>;

/// Why a controller invocation ended without converging.
///
/// A transient miss (no detection in one sample) never appears here: it is
/// retried inside the loop and counted against the iteration budget.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    /// A transform, sensor or motion call failed.  Fatal to the invocation.
    #[error("Resource Unavailable: {0}")]
    Unavailable(#[from] MantisError),

    #[error("Timeout: {operation} gave up after {iterations} iterations")]
    Timeout { operation: String, iterations: usize },

    #[error("No Consensus: best cluster had {best_count} members after {attempts} attempts")]
    NoConsensus { attempts: usize, best_count: usize },

    #[error("No Target")]
    NoTarget,

    #[error("Cancelled")]
    Cancelled,

    /// The distance feed ended before the threshold was crossed.
    #[error("Stream Closed")]
    StreamClosed,

    #[error("Motion Busy: held by {held_by}")]
    MotionBusy { held_by: String },
}

/// Terminal status reported to the orchestration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalStatus {
    Converged,
    Failed,
    NoTarget,
}

impl ControlError {
    pub fn status(&self) -> TerminalStatus {
        match self {
            ControlError::NoTarget => TerminalStatus::NoTarget,
            _ => TerminalStatus::Failed,
        }
    }

    pub(crate) fn from_kernel(operation: &str, err: KernelError) -> Self {
        match err {
            KernelError::Busy { held_by } => ControlError::MotionBusy { held_by },
            KernelError::IterationLimit { iterations } | KernelError::Deadline { iterations, .. } => {
                ControlError::Timeout {
                    operation: operation.to_string(),
                    iterations,
                }
            }
        }
    }
}

impl TerminalStatus {
    /// Status of a finished controller invocation.
    pub fn of<T>(result: &ControlResult<T>) -> Self {
        match result {
            Ok(_) => TerminalStatus::Converged,
            Err(e) => e.status(),
        }
    }
}

impl std::fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalStatus::Converged => write!(f, "CONVERGED"),
            TerminalStatus::Failed => write!(f, "FAILED"),
            TerminalStatus::NoTarget => write!(f, "NO_TARGET"),
        }
    }
}
