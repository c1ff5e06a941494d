//! Bridge to the external scheduler and allocator.
//!
//! The general scheduler (ready queues, load balancing) and the kernel heap
//! are collaborators, not part of this core. They register a static table of
//! entry points once at boot; everything here calls through it. Before
//! registration the admission calls are no-ops and allocation reports
//! exhaustion, so early-boot callers see ordinary failure paths instead of
//! faults.

use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use kestrel_abi::affinity::CoreAffinity;

/// Entry points supplied by the surrounding kernel.
#[repr(C)]
pub struct SchedBridge {
    /// Publish a newly created task to the ready structures. The affinity
    /// selects the candidate ready-queue partition; placement of
    /// unrestricted tasks is the scheduler's own policy.
    pub admit: fn(task_id: u32, affinity: CoreAffinity, priority: u8),
    /// Remove a task from all schedulable state ahead of deletion.
    pub withdraw: fn(task_id: u32),
    /// Allocate a task stack. Returns null when memory cannot be obtained.
    pub alloc_stack: fn(size: usize) -> *mut u8,
    /// Release a stack previously returned by `alloc_stack`.
    pub free_stack: fn(base: *mut u8, size: usize),
}

static BRIDGE: AtomicPtr<SchedBridge> = AtomicPtr::new(ptr::null_mut());

/// Register the kernel's bridge table. Called once during boot, before the
/// first task is created; a later call replaces the table wholesale.
pub fn register_bridge(bridge: &'static SchedBridge) {
    BRIDGE.store(bridge as *const SchedBridge as *mut SchedBridge, Ordering::Release);
}

pub fn is_bridge_registered() -> bool {
    !BRIDGE.load(Ordering::Acquire).is_null()
}

#[inline]
fn bridge() -> Option<&'static SchedBridge> {
    let ptr = BRIDGE.load(Ordering::Acquire);
    if ptr.is_null() {
        None
    } else {
        // SAFETY: only `register_bridge` stores a non-null pointer, and it
        // requires a &'static SchedBridge.
        Some(unsafe { &*ptr })
    }
}

pub(crate) fn admit_task(task_id: u32, affinity: CoreAffinity, priority: u8) {
    if let Some(b) = bridge() {
        (b.admit)(task_id, affinity, priority);
    }
}

pub(crate) fn withdraw_task(task_id: u32) {
    if let Some(b) = bridge() {
        (b.withdraw)(task_id);
    }
}

pub(crate) fn alloc_stack(size: usize) -> *mut u8 {
    bridge()
        .map(|b| (b.alloc_stack)(size))
        .unwrap_or(ptr::null_mut())
}

pub(crate) fn free_stack(base: *mut u8, size: usize) {
    if base.is_null() {
        return;
    }
    if let Some(b) = bridge() {
        (b.free_stack)(base, size);
    }
}
