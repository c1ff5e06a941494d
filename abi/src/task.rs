//! Task-related types and constants shared across the lifecycle core.
//!
//! This module contains the canonical definitions for task control blocks
//! and their local-storage slots, eliminating duplicate definitions between
//! the creation service, the per-core registry, and the surrounding kernel.

use core::ffi::c_void;
use core::ptr;

use crate::affinity::CoreAffinity;

// =============================================================================
// Task Configuration Constants
// =============================================================================

/// Capacity cap for the per-core registry. The live core count is fixed at
/// boot and may be any value in `1..=MAX_CORES`.
pub const MAX_CORES: usize = 8;
pub const MAX_TASKS: usize = 32;
pub const TASK_NAME_MAX_LEN: usize = 32;
/// Smallest stack a task may be created with, in bytes.
pub const TASK_MIN_STACK_SIZE: usize = 0x1000; // 4KB
/// Default stack size for internally created tasks (idle tasks).
pub const TASK_DEFAULT_STACK_SIZE: usize = 0x4000; // 16KB
/// Number of local-storage slots per task, fixed at build time.
pub const TASK_LOCAL_STORAGE_SLOTS: usize = 8;
pub const INVALID_TASK_ID: u32 = 0xFFFF_FFFF;

// =============================================================================
// Task State Constants
// =============================================================================

pub const TASK_STATE_INVALID: u8 = 0;
pub const TASK_STATE_READY: u8 = 1;
pub const TASK_STATE_RUNNING: u8 = 2;
pub const TASK_STATE_TERMINATED: u8 = 3;

// =============================================================================
// Task Priority Constants
// =============================================================================

pub const TASK_PRIORITY_HIGH: u8 = 0;
pub const TASK_PRIORITY_NORMAL: u8 = 1;
pub const TASK_PRIORITY_LOW: u8 = 2;
pub const TASK_PRIORITY_IDLE: u8 = 3;

bitflags::bitflags! {
    /// Per-task attribute flags.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TaskFlags: u16 {
        /// Stack and control block are caller-owned static storage; the
        /// lifecycle core must not release them.
        const STATIC_STORAGE = 0x01;
        /// Per-core idle task, owned by the core registry for the process
        /// lifetime.
        const IDLE = 0x02;
    }
}

/// Entry routine for a task. The argument is the opaque parameter supplied
/// at creation.
pub type TaskEntry = fn(*mut c_void);

/// Destructor callback for a local-storage slot, invoked at task deletion
/// with the slot's index and last-set value.
pub type SlotDestructor = fn(usize, *mut c_void);

// =============================================================================
// Local-Storage Slots
// =============================================================================

/// One per-task local-storage cell: an opaque value pointer and an optional
/// deletion callback. The kernel never interprets the value; a slot with no
/// destructor is never auto-cleaned.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct LocalSlot {
    pub value: *mut c_void,
    pub destructor: Option<SlotDestructor>,
}

impl LocalSlot {
    /// Create an empty (never set) slot.
    pub const fn empty() -> Self {
        Self {
            value: ptr::null_mut(),
            destructor: None,
        }
    }

    /// True if a destructor is registered for this slot.
    #[inline]
    pub fn has_destructor(&self) -> bool {
        self.destructor.is_some()
    }
}

// =============================================================================
// Task Struct
// =============================================================================

/// Task control block.
///
/// `Copy` plus the `const fn invalid()` constructor let the task table live
/// in statically initialized storage; callers of the static creation mode
/// also use `invalid()` to reserve a control block in their own storage.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct Task {
    pub task_id: u32,
    pub name: [u8; TASK_NAME_MAX_LEN],
    pub state: u8,
    pub priority: u8,
    pub flags: TaskFlags,
    /// Immutable after the task is published.
    pub affinity: CoreAffinity,
    pub stack_base: *mut u8,
    pub stack_size: usize,
    pub entry_point: Option<TaskEntry>,
    pub entry_arg: *mut c_void,
    pub local_slots: [LocalSlot; TASK_LOCAL_STORAGE_SLOTS],
    /// Set once by the deletion hook; a drained slot array never fires a
    /// destructor again.
    pub slots_drained: bool,
}

impl Task {
    /// Create an invalid (uninitialized) task.
    pub const fn invalid() -> Self {
        Self {
            task_id: INVALID_TASK_ID,
            name: [0; TASK_NAME_MAX_LEN],
            state: TASK_STATE_INVALID,
            priority: TASK_PRIORITY_NORMAL,
            flags: TaskFlags::empty(),
            affinity: CoreAffinity::Unrestricted,
            stack_base: ptr::null_mut(),
            stack_size: 0,
            entry_point: None,
            entry_arg: ptr::null_mut(),
            local_slots: [LocalSlot::empty(); TASK_LOCAL_STORAGE_SLOTS],
            slots_drained: false,
        }
    }

    /// True if this control block holds a live (created, not yet deleted)
    /// task.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.state == TASK_STATE_READY || self.state == TASK_STATE_RUNNING
    }
}

pub fn task_state_to_str(state: u8) -> &'static str {
    match state {
        TASK_STATE_INVALID => "invalid",
        TASK_STATE_READY => "ready",
        TASK_STATE_RUNNING => "running",
        TASK_STATE_TERMINATED => "terminated",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_task_is_not_live() {
        let task = Task::invalid();
        assert_eq!(task.task_id, INVALID_TASK_ID);
        assert_eq!(task.state, TASK_STATE_INVALID);
        assert!(!task.is_live());
        assert!(!task.slots_drained);
    }

    #[test]
    fn empty_slot_has_no_destructor() {
        let slot = LocalSlot::empty();
        assert!(slot.value.is_null());
        assert!(!slot.has_destructor());
    }

    #[test]
    fn state_names() {
        assert_eq!(task_state_to_str(TASK_STATE_READY), "ready");
        assert_eq!(task_state_to_str(0xAA), "unknown");
    }
}
