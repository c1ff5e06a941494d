//! Atomic initialization flags for kernel subsystems.
//!
//! `InitFlag` is the canonical way to track whether a subsystem has been
//! initialized, replacing hand-rolled `AtomicBool` statics and their
//! accessor boilerplate.
//!
//! # Memory Ordering
//!
//! - `init_once()` uses a `SeqCst` swap so the claim is visible to all cores
//! - `mark_set()` uses `Release` to publish initialization side-effects
//! - `is_set()` uses `Acquire` to observe initialization side-effects
//! - `is_set_relaxed()` is for fast paths that don't need the side-effects

use core::sync::atomic::{AtomicBool, Ordering};

/// Atomic flag for tracking initialization state.
///
/// ```ignore
/// static REGISTRY_INIT: InitFlag = InitFlag::new();
///
/// pub fn init() {
///     if !REGISTRY_INIT.init_once() {
///         return; // Already initialized, skip
///     }
///     // ... perform initialization ...
/// }
/// ```
#[repr(transparent)]
pub struct InitFlag {
    flag: AtomicBool,
}

impl InitFlag {
    /// Create a new unset flag.
    #[inline]
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Atomically attempt to initialize.
    ///
    /// Returns `true` if this call performed the initialization (flag was
    /// previously unset), `false` if already initialized.
    #[inline]
    pub fn init_once(&self) -> bool {
        // swap returns the OLD value
        !self.flag.swap(true, Ordering::SeqCst)
    }

    /// Check if the flag is set.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Check if the flag is set (relaxed ordering).
    #[inline]
    pub fn is_set_relaxed(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Explicitly set the flag, publishing prior side-effects.
    #[inline]
    pub fn mark_set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Reset the flag to unset state.
    ///
    /// Only for teardown paths and subsystems that support
    /// re-initialization.
    #[inline]
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Default for InitFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_once_claims_exactly_once() {
        let flag = InitFlag::new();
        assert!(!flag.is_set());
        assert!(flag.init_once());
        assert!(!flag.init_once());
        assert!(flag.is_set());
    }

    #[test]
    fn reset_allows_reinit() {
        let flag = InitFlag::new();
        assert!(flag.init_once());
        flag.reset();
        assert!(!flag.is_set_relaxed());
        assert!(flag.init_once());
    }
}
