//! Per-task local-storage slots and their deletion-time drain.
//!
//! Each task carries a fixed array of `(value, destructor)` cells the kernel
//! itself never interprets. The registry is a dumb mapping: overwriting a
//! slot does not invoke the previous destructor; callers wanting
//! cleanup-on-overwrite invoke it themselves before replacing.
//!
//! `drain` belongs to the kernel's deletion path. It must run exactly once
//! per task, after the task is unschedulable and before its backing storage
//! is released. The drained mark is tested-and-set under the table lock, so
//! even a defensive second call fires nothing; the destructor bodies
//! themselves run outside the lock.

use core::ffi::c_void;

use kestrel_abi::error::{TaskError, TaskResult};
use kestrel_abi::task::{LocalSlot, SlotDestructor, TASK_LOCAL_STORAGE_SLOTS};
use kestrel_lib::klog_info;

use crate::task;

/// Store `value` (and an optional deletion callback) in slot `index` of a
/// live task. Overwrites any previous value and destructor registration for
/// that index without invoking the previous destructor.
pub fn task_set_local_storage(
    task_id: u32,
    index: usize,
    value: *mut c_void,
    destructor: Option<SlotDestructor>,
) -> TaskResult<()> {
    if index >= TASK_LOCAL_STORAGE_SLOTS {
        klog_info!("set_local_storage: slot index {} out of range", index);
        return Err(TaskError::InvalidArgument);
    }
    task::with_live_task_mut(task_id, |task| {
        if task.slots_drained {
            return Err(TaskError::InvalidArgument);
        }
        task.local_slots[index] = LocalSlot { value, destructor };
        Ok(())
    })?
}

/// Read slot `index` of a live task: the stored value, or null if the slot
/// was never set.
pub fn task_local_storage(task_id: u32, index: usize) -> TaskResult<*mut c_void> {
    if index >= TASK_LOCAL_STORAGE_SLOTS {
        return Err(TaskError::InvalidArgument);
    }
    task::with_live_task_mut(task_id, |task| {
        if task.slots_drained {
            return Err(TaskError::InvalidArgument);
        }
        Ok(task.local_slots[index].value)
    })?
}

/// Deletion hook: invoke every registered slot destructor exactly once, in
/// ascending index order, with `(index, value)`.
///
/// The surrounding kernel calls this once per task, after the task can no
/// longer run anywhere and strictly before its stack and control block are
/// reclaimed. A repeated call for the same identity is a no-op.
pub fn task_drain_local_storage(task_id: u32) -> TaskResult<()> {
    let slots = task::with_present_task_mut(task_id, |task| {
        if task.slots_drained {
            None
        } else {
            task.slots_drained = true;
            Some(task.local_slots)
        }
    })?;

    let Some(slots) = slots else {
        return Ok(());
    };
    for (index, slot) in slots.iter().enumerate() {
        if let Some(destructor) = slot.destructor {
            destructor(index, slot.value);
        }
    }
    Ok(())
}
