//! Privilege transition manager
//!
//! The one-way drop from Trusted to Untrusted. Preconditions are checked
//! here so that no backend can skip them:
//!
//! 1. the trap vector is installed (the first sandbox trap must have a home)
//! 2. the core is currently Trusted
//! 3. this core has not already dropped since boot
//!
//! The only way back to Trusted is a trap.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::arch::{PrivilegeLevel, ProtectionUnit};
use crate::error::TransitionError;

/// Tracks whether the core has entered its untrusted context
#[derive(Debug, Default)]
pub struct TransitionManager {
    lowered: AtomicBool,
}

impl TransitionManager {
    pub const fn new() -> Self {
        Self {
            lowered: AtomicBool::new(false),
        }
    }

    /// Drop to Untrusted at `entry`
    ///
    /// # Errors
    /// [`TransitionError`] if a precondition does not hold; the unit is not
    /// touched in that case.
    pub fn drop_privilege<U: ProtectionUnit>(&self, unit: &mut U, entry: u32) -> Result<(), TransitionError> {
        if unit.trap_vector().is_none() {
            return Err(TransitionError::TrapVectorMissing);
        }
        if unit.current_level() != PrivilegeLevel::Trusted {
            return Err(TransitionError::NotTrusted);
        }
        if self.lowered.swap(true, Ordering::AcqRel) {
            return Err(TransitionError::AlreadyLowered);
        }

        log::info!("dropping to untrusted mode at {:#010x}", entry);
        unit.enter_untrusted(entry);
        Ok(())
    }

    /// Whether the drop has happened
    pub fn is_lowered(&self) -> bool {
        self.lowered.load(Ordering::Acquire)
    }
}
