//! Per-core registry for SMP support.
//!
//! One entry per physical core, fixed at boot: the task currently executing
//! on that core and the core's idle task. Each `current_task` field has a
//! single writer (that core's own context-switch path) and any number of
//! readers, so the registry needs no lock; plain release stores and acquire
//! loads keep cross-core readers from ever seeing a torn value.
//!
//! Current-task reads are advisory: another core may switch away between
//! the load and whatever the caller does with the identity. Idle identities
//! are stable for the process lifetime once boot completes.

use core::ffi::c_void;
use core::ptr;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use kestrel_abi::affinity::CoreAffinity;
use kestrel_abi::error::{TaskError, TaskResult};
use kestrel_abi::task::{
    TaskFlags, INVALID_TASK_ID, MAX_CORES, TASK_DEFAULT_STACK_SIZE, TASK_PRIORITY_IDLE,
};
use kestrel_lib::{klog_debug, klog_info, InitFlag};

use crate::task;

#[repr(C, align(64))]
struct CoreEntry {
    /// Identity of the task presently running on this core. Written only by
    /// the owning core's context-switch path.
    current_task: AtomicU32,
    /// Identity of this core's idle task. Written during boot, stable after.
    idle_task: AtomicU32,
}

impl CoreEntry {
    const fn new() -> Self {
        Self {
            current_task: AtomicU32::new(INVALID_TASK_ID),
            idle_task: AtomicU32::new(INVALID_TASK_ID),
        }
    }
}

const EMPTY_CORE: CoreEntry = CoreEntry::new();

static CORES: [CoreEntry; MAX_CORES] = [EMPTY_CORE; MAX_CORES];
static CORE_COUNT: AtomicUsize = AtomicUsize::new(0);
static REGISTRY_INIT: InitFlag = InitFlag::new();

/// Entry routine for idle tasks. Never actually runs inside this core
/// (context switching belongs to the surrounding kernel), but every task
/// carries a runnable entry point.
fn idle_entry(_arg: *mut c_void) {
    loop {
        core::hint::spin_loop();
    }
}

/// Build the `idleN` display name without allocating.
fn idle_name(buf: &mut [u8; 8], core_id: usize) -> &str {
    buf[..4].copy_from_slice(b"idle");
    let mut len = 4;
    if core_id >= 10 {
        buf[len] = b'0' + (core_id / 10) as u8;
        len += 1;
    }
    buf[len] = b'0' + (core_id % 10) as u8;
    len += 1;
    core::str::from_utf8(&buf[..len]).unwrap_or("idle")
}

/// Bring the registry up with exactly `core_count` entries, creating one
/// pinned idle task per core. Runs once at boot; repeated calls are no-ops.
/// On mid-boot failure every idle task created so far is torn down again;
/// there is no partially initialized registry.
pub fn init_core_registry(core_count: usize) -> TaskResult<()> {
    if core_count == 0 || core_count > MAX_CORES {
        klog_info!("core_registry: invalid core count {}", core_count);
        return Err(TaskError::InvalidArgument);
    }
    if !REGISTRY_INIT.init_once() {
        return Ok(());
    }
    CORE_COUNT.store(core_count, Ordering::Release);

    for core_id in 0..core_count {
        let mut buf = [0u8; 8];
        let name = idle_name(&mut buf, core_id);
        match task::create_internal(
            name,
            idle_entry,
            ptr::null_mut(),
            TASK_DEFAULT_STACK_SIZE,
            TASK_PRIORITY_IDLE,
            CoreAffinity::Pinned(core_id),
            TaskFlags::IDLE,
        ) {
            Ok(idle_id) => {
                CORES[core_id].idle_task.store(idle_id, Ordering::Release);
                CORES[core_id].current_task.store(idle_id, Ordering::Release);
            }
            Err(err) => {
                klog_info!("core_registry: no idle task for core {}", core_id);
                unwind_partial_init(core_id);
                return Err(err);
            }
        }
    }

    klog_debug!("core_registry: {} cores online", core_count);
    Ok(())
}

fn unwind_partial_init(cores_created: usize) {
    for core_id in 0..cores_created {
        let idle_id = CORES[core_id].idle_task.load(Ordering::Acquire);
        if idle_id != INVALID_TASK_ID {
            let _ = task::delete_idle_task(idle_id);
        }
        CORES[core_id].idle_task.store(INVALID_TASK_ID, Ordering::Release);
        CORES[core_id].current_task.store(INVALID_TASK_ID, Ordering::Release);
    }
    CORE_COUNT.store(0, Ordering::Release);
    REGISTRY_INIT.reset();
}

/// Tear the registry down again, releasing the idle tasks. Teardown and
/// test surface; a running system never calls this.
pub fn shutdown_core_registry() {
    if !REGISTRY_INIT.is_set() {
        return;
    }
    unwind_partial_init(CORE_COUNT.load(Ordering::Acquire));
}

/// Boot-fixed number of cores; zero before `init_core_registry`.
pub fn core_count() -> usize {
    CORE_COUNT.load(Ordering::Acquire)
}

pub fn is_core_registry_initialized() -> bool {
    REGISTRY_INIT.is_set()
}

#[inline]
fn check_core_id(core_id: usize) -> TaskResult<()> {
    if core_id >= core_count() {
        return Err(TaskError::InvalidCoreId);
    }
    Ok(())
}

/// Identity of the task presently running on `core_id`.
///
/// Advisory only: the value reflects the most recent context switch observed
/// on that core and may already be outdated when the caller looks at it.
pub fn current_task_on(core_id: usize) -> TaskResult<u32> {
    check_core_id(core_id)?;
    Ok(CORES[core_id].current_task.load(Ordering::Acquire))
}

/// Identity of `core_id`'s idle task. Stable once boot completes.
pub fn idle_task_on(core_id: usize) -> TaskResult<u32> {
    check_core_id(core_id)?;
    Ok(CORES[core_id].idle_task.load(Ordering::Acquire))
}

/// Consumed context-switch event: `core_id` is now running `task_id`.
/// Must be called only from the owning core's context-switch path.
pub fn record_context_switch(core_id: usize, task_id: u32) -> TaskResult<()> {
    check_core_id(core_id)?;
    CORES[core_id].current_task.store(task_id, Ordering::Release);
    Ok(())
}
