//! [`MotionLock`] – one motion-issuing operation at a time.
//!
//! Every controller that drives the base must hold a [`MotionGuard`] for the
//! whole of its run.  A second caller is refused with [`KernelError::Busy`]
//! rather than queued, so two controllers can never interleave commands to
//! the same drive.  The guard releases the lock when dropped.
//!
//! # Example
//!
//! ```
//! use mantis_kernel::{KernelError, MotionLock};
//!
//! let lock = MotionLock::new();
//! let guard = lock.try_acquire("align").unwrap();
//!
//! assert!(matches!(
//!     lock.try_acquire("approach"),
//!     Err(KernelError::Busy { held_by }) if held_by == "align"
//! ));
//!
//! drop(guard);
//! assert!(lock.try_acquire("approach").is_ok());
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::KernelError;

/// Shared, cloneable motion lock.  Clones refer to the same lock.
#[derive(Debug, Clone, Default)]
pub struct MotionLock {
    owner: Arc<Mutex<Option<String>>>,
}

impl MotionLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn owner(&self) -> MutexGuard<'_, Option<String>> {
        self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the lock for `operation`.
    ///
    /// # Errors
    ///
    /// [`KernelError::Busy`] naming the current holder when the lock is taken.
    pub fn try_acquire(&self, operation: &str) -> Result<MotionGuard, KernelError> {
        let mut owner = self.owner();
        if let Some(held_by) = owner.as_ref() {
            warn!(operation, held_by = %held_by, "motion lock busy");
            return Err(KernelError::Busy {
                held_by: held_by.clone(),
            });
        }
        debug!(operation, "motion lock acquired");
        *owner = Some(operation.to_string());
        Ok(MotionGuard {
            lock: self.clone(),
            operation: operation.to_string(),
        })
    }

    /// Name of the operation currently holding the lock.
    pub fn holder(&self) -> Option<String> {
        self.owner().clone()
    }

    pub fn is_held(&self) -> bool {
        self.owner().is_some()
    }
}

/// Proof of exclusive motion access.  Releases the lock on drop.
#[derive(Debug)]
pub struct MotionGuard {
    lock: MotionLock,
    operation: String,
}

impl MotionGuard {
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Drop for MotionGuard {
    fn drop(&mut self) {
        debug!(operation = %self.operation, "motion lock released");
        *self.lock.owner() = None;
    }
}
