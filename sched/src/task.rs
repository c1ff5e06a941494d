//! Task table and creation service.
//!
//! Control blocks live in a fixed table guarded by one spin lock, the
//! scheduler-wide critical section for structural mutation. The lock is held
//! only while the table itself is touched, never across the admission bridge
//! or a local-storage destructor.
//!
//! Creation has two modes sharing one finalize-and-publish step: dynamic
//! (stack obtained through the allocator bridge, control block claimed from
//! the table) and static (caller-owned stack and control block, the table
//! records a pointer). A task becomes visible in a single table commit; no
//! caller ever observes a half-constructed task.

use core::ffi::c_void;

use kestrel_abi::affinity::CoreAffinity;
use kestrel_abi::error::{TaskError, TaskResult};
use kestrel_abi::task::{
    Task, TaskEntry, TaskFlags, INVALID_TASK_ID, MAX_TASKS, TASK_MIN_STACK_SIZE,
    TASK_NAME_MAX_LEN, TASK_PRIORITY_IDLE, TASK_STATE_INVALID, TASK_STATE_READY,
    TASK_STATE_TERMINATED,
};
use kestrel_lib::{klog_debug, klog_info};
use spin::Mutex;

use crate::bridge;
use crate::local_storage;

/// One entry of the task table.
#[derive(Clone, Copy)]
enum TaskEntrySlot {
    Free,
    /// Control block owned by the table (dynamic creation).
    Resident(Task),
    /// Control block in caller-supplied static storage (static creation).
    External(*mut Task),
}

struct TaskTable {
    slots: [TaskEntrySlot; MAX_TASKS],
    next_task_id: u32,
    num_tasks: u32,
    tasks_created: u32,
    tasks_deleted: u32,
}

// SAFETY: TaskTable contains raw pointers to control blocks handed in as
// &'static mut by static creation; they are reachable only through this
// table and all access is serialized through the TASKS mutex.
unsafe impl Send for TaskTable {}

impl TaskTable {
    const fn new() -> Self {
        Self {
            slots: [TaskEntrySlot::Free; MAX_TASKS],
            next_task_id: 1,
            num_tasks: 0,
            tasks_created: 0,
            tasks_deleted: 0,
        }
    }

    fn allocate_task_id(&mut self) -> u32 {
        let id = self.next_task_id;
        self.next_task_id = self.next_task_id.wrapping_add(1);
        if self.next_task_id == INVALID_TASK_ID || self.next_task_id == 0 {
            self.next_task_id = 1;
        }
        id
    }

    fn find_free_slot(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, TaskEntrySlot::Free))
    }

    fn task_id_at(&self, idx: usize) -> Option<u32> {
        match self.slots[idx] {
            TaskEntrySlot::Free => None,
            TaskEntrySlot::Resident(ref task) => Some(task.task_id),
            // SAFETY: the pointer was registered from a &'static mut control
            // block and stays valid while the slot is occupied.
            TaskEntrySlot::External(ptr) => Some(unsafe { (*ptr).task_id }),
        }
    }

    fn task_mut(&mut self, idx: usize) -> Option<&mut Task> {
        match self.slots[idx] {
            TaskEntrySlot::Free => None,
            TaskEntrySlot::Resident(ref mut task) => Some(task),
            // SAFETY: exclusive access is guaranteed by the table lock; the
            // storage is &'static mut for the lifetime of the slot.
            TaskEntrySlot::External(ptr) => Some(unsafe { &mut *ptr }),
        }
    }

    fn slot_index_of(&self, task_id: u32) -> Option<usize> {
        if task_id == INVALID_TASK_ID {
            return None;
        }
        (0..MAX_TASKS).find(|&idx| self.task_id_at(idx) == Some(task_id))
    }

    fn find_task_mut(&mut self, task_id: u32, live_only: bool) -> Option<&mut Task> {
        let idx = self.slot_index_of(task_id)?;
        let task = self.task_mut(idx)?;
        if live_only && !task.is_live() {
            return None;
        }
        Some(task)
    }
}

static TASKS: Mutex<TaskTable> = Mutex::new(TaskTable::new());

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub created: u32,
    pub active: u32,
    pub deleted: u32,
}

/// Reset the task table. Called once at boot, before the core registry is
/// brought up and before the first task is created.
pub fn init_task_table() {
    let mut table = TASKS.lock();
    *table = TaskTable::new();
}

fn copy_name(dest: &mut [u8; TASK_NAME_MAX_LEN], src: &str) {
    let bytes = src.as_bytes();
    let len = bytes.len().min(TASK_NAME_MAX_LEN - 1);
    dest[..len].copy_from_slice(&bytes[..len]);
    for byte in dest[len..].iter_mut() {
        *byte = 0;
    }
}

fn build_task(
    name: &str,
    entry: TaskEntry,
    arg: *mut c_void,
    stack_base: *mut u8,
    stack_size: usize,
    priority: u8,
    affinity: CoreAffinity,
    flags: TaskFlags,
) -> Task {
    let mut task = Task::invalid();
    copy_name(&mut task.name, name);
    task.state = TASK_STATE_READY;
    task.priority = priority.min(TASK_PRIORITY_IDLE);
    task.flags = flags;
    task.affinity = affinity;
    task.stack_base = stack_base;
    task.stack_size = stack_size;
    task.entry_point = Some(entry);
    task.entry_arg = arg;
    task
}

/// Shared finalize-and-publish step for both creation modes. Commits the
/// fully-formed task to the table in one critical section, then hands it to
/// the admission bridge (idle tasks stay registry-owned and skip admission).
fn finalize_and_publish(mut task: Task, external: Option<*mut Task>) -> TaskResult<u32> {
    let affinity = task.affinity;
    let priority = task.priority;
    let admit = !task.flags.contains(TaskFlags::IDLE);

    let task_id = {
        let mut table = TASKS.lock();
        let Some(slot_idx) = table.find_free_slot() else {
            klog_info!("task_create: task table exhausted");
            return Err(TaskError::AllocationFailure);
        };
        let task_id = table.allocate_task_id();
        task.task_id = task_id;
        match external {
            Some(tcb) => {
                // SAFETY: `tcb` came from a &'static mut in
                // `task_create_static` and is not yet linked into the table,
                // so this write is exclusive.
                unsafe {
                    *tcb = task;
                }
                table.slots[slot_idx] = TaskEntrySlot::External(tcb);
            }
            None => {
                table.slots[slot_idx] = TaskEntrySlot::Resident(task);
            }
        }
        table.num_tasks += 1;
        table.tasks_created += 1;
        task_id
    };

    if admit {
        bridge::admit_task(task_id, affinity, priority);
    }
    klog_debug!("task {} published", task_id);
    Ok(task_id)
}

pub(crate) fn create_internal(
    name: &str,
    entry: TaskEntry,
    arg: *mut c_void,
    stack_size: usize,
    priority: u8,
    affinity: CoreAffinity,
    flags: TaskFlags,
) -> TaskResult<u32> {
    let affinity = affinity.validated(crate::per_core::core_count())?;
    if stack_size < TASK_MIN_STACK_SIZE {
        klog_info!("task_create: stack size {} below minimum", stack_size);
        return Err(TaskError::InvalidArgument);
    }

    let stack_base = bridge::alloc_stack(stack_size);
    if stack_base.is_null() {
        klog_info!("task_create: failed to allocate {} byte stack", stack_size);
        return Err(TaskError::AllocationFailure);
    }

    let task = build_task(name, entry, arg, stack_base, stack_size, priority, affinity, flags);
    match finalize_and_publish(task, None) {
        Ok(task_id) => Ok(task_id),
        Err(err) => {
            bridge::free_stack(stack_base, stack_size);
            Err(err)
        }
    }
}

/// Create a task with internally allocated storage.
///
/// The stack comes from the registered allocator bridge; on any failure no
/// task is created and nothing is published.
pub fn task_create(
    name: &str,
    entry: TaskEntry,
    arg: *mut c_void,
    stack_size: usize,
    priority: u8,
    affinity: CoreAffinity,
) -> TaskResult<u32> {
    create_internal(name, entry, arg, stack_size, priority, affinity, TaskFlags::empty())
}

/// Create a task in caller-supplied static storage.
///
/// The service only initializes the given stack and control block; it never
/// releases them. An undersized stack or a control block that still holds a
/// live task is `InvalidArgument`.
pub fn task_create_static(
    name: &str,
    entry: TaskEntry,
    arg: *mut c_void,
    stack: &'static mut [u8],
    tcb: &'static mut Task,
    priority: u8,
    affinity: CoreAffinity,
) -> TaskResult<u32> {
    let affinity = affinity.validated(crate::per_core::core_count())?;
    if stack.len() < TASK_MIN_STACK_SIZE {
        klog_info!("task_create_static: stack buffer {} below minimum", stack.len());
        return Err(TaskError::InvalidArgument);
    }
    if tcb.state != TASK_STATE_INVALID {
        klog_info!("task_create_static: control block already in use");
        return Err(TaskError::InvalidArgument);
    }

    let stack_base = stack.as_mut_ptr();
    let stack_size = stack.len();
    let task = build_task(
        name,
        entry,
        arg,
        stack_base,
        stack_size,
        priority,
        affinity,
        TaskFlags::STATIC_STORAGE,
    );
    finalize_and_publish(task, Some(tcb as *mut Task))
}

/// Delete a task: withdraw it from the ready structures, drain its
/// local-storage slots, then release its backing storage. The drain always
/// completes before any storage is reclaimed.
pub fn task_delete(task_id: u32) -> TaskResult<()> {
    {
        let mut table = TASKS.lock();
        let Some(task) = table.find_task_mut(task_id, true) else {
            klog_info!("task_delete: task {} not found", task_id);
            return Err(TaskError::InvalidArgument);
        };
        if task.flags.contains(TaskFlags::IDLE) {
            klog_info!("task_delete: refusing to delete idle task {}", task_id);
            return Err(TaskError::InvalidArgument);
        }
        task.state = TASK_STATE_TERMINATED;
    }

    bridge::withdraw_task(task_id);
    local_storage::task_drain_local_storage(task_id)?;
    release_task(task_id)
}

/// Registry-internal deletion of an idle task during teardown. Idle tasks
/// were never admitted, so there is nothing to withdraw.
pub(crate) fn delete_idle_task(task_id: u32) -> TaskResult<()> {
    {
        let mut table = TASKS.lock();
        let Some(task) = table.find_task_mut(task_id, false) else {
            return Err(TaskError::InvalidArgument);
        };
        task.state = TASK_STATE_TERMINATED;
    }
    local_storage::task_drain_local_storage(task_id)?;
    release_task(task_id)
}

fn release_task(task_id: u32) -> TaskResult<()> {
    let (stack_base, stack_size, flags) = {
        let mut table = TASKS.lock();
        let Some(idx) = table.slot_index_of(task_id) else {
            return Err(TaskError::InvalidArgument);
        };
        let released = match table.slots[idx] {
            TaskEntrySlot::Free => return Err(TaskError::InvalidArgument),
            TaskEntrySlot::Resident(task) => (task.stack_base, task.stack_size, task.flags),
            TaskEntrySlot::External(tcb) => {
                // SAFETY: exclusive access through the table lock; the
                // control block is returned to the caller as invalid.
                let task = unsafe { *tcb };
                unsafe {
                    *tcb = Task::invalid();
                }
                (task.stack_base, task.stack_size, task.flags)
            }
        };
        table.slots[idx] = TaskEntrySlot::Free;
        table.num_tasks = table.num_tasks.saturating_sub(1);
        table.tasks_deleted += 1;
        released
    };

    if !flags.contains(TaskFlags::STATIC_STORAGE) {
        bridge::free_stack(stack_base, stack_size);
    }
    klog_debug!("task {} deleted", task_id);
    Ok(())
}

/// Delete every live task except the per-core idle tasks. Teardown helper.
pub fn task_shutdown_all() -> TaskResult<()> {
    let mut doomed = [INVALID_TASK_ID; MAX_TASKS];
    let mut count = 0;
    {
        let mut table = TASKS.lock();
        for idx in 0..MAX_TASKS {
            let Some(task_id) = table.task_id_at(idx) else {
                continue;
            };
            if let Some(task) = table.task_mut(idx) {
                if task.is_live() && !task.flags.contains(TaskFlags::IDLE) {
                    doomed[count] = task_id;
                    count += 1;
                }
            }
        }
    }

    let mut result = Ok(());
    for &task_id in doomed.iter().take(count) {
        if let Err(err) = task_delete(task_id) {
            result = Err(err);
        }
    }
    result
}

// =============================================================================
// Query surface
// =============================================================================

/// Core affinity of a live task. Immutable after creation, so the value is
/// exact, not advisory.
pub fn task_affinity(task_id: u32) -> TaskResult<CoreAffinity> {
    with_live_task_mut(task_id, |task| task.affinity)
}

pub fn task_state(task_id: u32) -> TaskResult<u8> {
    with_present_task_mut(task_id, |task| task.state)
}

pub fn task_priority(task_id: u32) -> TaskResult<u8> {
    with_live_task_mut(task_id, |task| task.priority)
}

/// Copy a task's NUL-terminated display name into `out`, returning the
/// number of name bytes written (truncated to `out.len()`).
pub fn task_name(task_id: u32, out: &mut [u8]) -> TaskResult<usize> {
    with_live_task_mut(task_id, |task| {
        let len = task
            .name
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(TASK_NAME_MAX_LEN);
        let copied = len.min(out.len());
        out[..copied].copy_from_slice(&task.name[..copied]);
        copied
    })
}

pub fn task_stats() -> TaskStats {
    let table = TASKS.lock();
    TaskStats {
        created: table.tasks_created,
        active: table.num_tasks,
        deleted: table.tasks_deleted,
    }
}

// =============================================================================
// Table access for sibling modules
// =============================================================================

/// Run `f` against a live task under the table lock. The closure must stay
/// structural: no destructor bodies, no bridge calls.
pub(crate) fn with_live_task_mut<R>(
    task_id: u32,
    f: impl FnOnce(&mut Task) -> R,
) -> TaskResult<R> {
    let mut table = TASKS.lock();
    match table.find_task_mut(task_id, true) {
        Some(task) => Ok(f(task)),
        None => Err(TaskError::InvalidArgument),
    }
}

/// Like [`with_live_task_mut`] but also reaches tasks already marked
/// terminated: the deletion hook runs between unscheduling and release.
pub(crate) fn with_present_task_mut<R>(
    task_id: u32,
    f: impl FnOnce(&mut Task) -> R,
) -> TaskResult<R> {
    let mut table = TASKS.lock();
    match table.find_task_mut(task_id, false) {
        Some(task) => Ok(f(task)),
        None => Err(TaskError::InvalidArgument),
    }
}
