//! Shared fixtures for the lifecycle tests: a process-wide environment
//! lock (the kernel state is global, tests must not interleave), a
//! recording admission bridge, and a heap-backed stack allocator with a
//! failure knob.

use core::sync::atomic::{AtomicIsize, Ordering};
use std::alloc::{alloc, dealloc, Layout};
use std::sync::{Mutex as StdMutex, MutexGuard};
use std::vec::Vec;

use kestrel_abi::affinity::CoreAffinity;

use crate::bridge::{register_bridge, SchedBridge};
use crate::per_core;
use crate::task;

pub(crate) static ADMITTED: spin::Mutex<Vec<(u32, CoreAffinity, u8)>> =
    spin::Mutex::new(Vec::new());
pub(crate) static WITHDRAWN: spin::Mutex<Vec<u32>> = spin::Mutex::new(Vec::new());

/// Remaining allocations before the stack allocator reports exhaustion;
/// negative means unlimited.
static ALLOC_BUDGET: AtomicIsize = AtomicIsize::new(-1);
/// Stacks currently outstanding, for leak checks.
static LIVE_STACKS: AtomicIsize = AtomicIsize::new(0);

fn recording_admit(task_id: u32, affinity: CoreAffinity, priority: u8) {
    ADMITTED.lock().push((task_id, affinity, priority));
}

fn recording_withdraw(task_id: u32) {
    WITHDRAWN.lock().push(task_id);
}

fn stack_layout(size: usize) -> Layout {
    Layout::from_size_align(size, 16).expect("stack layout")
}

fn heap_alloc_stack(size: usize) -> *mut u8 {
    loop {
        let budget = ALLOC_BUDGET.load(Ordering::SeqCst);
        if budget < 0 {
            break;
        }
        if budget == 0 {
            return core::ptr::null_mut();
        }
        if ALLOC_BUDGET
            .compare_exchange(budget, budget - 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            break;
        }
    }
    LIVE_STACKS.fetch_add(1, Ordering::SeqCst);
    // SAFETY: size is nonzero (creation enforces the stack minimum).
    unsafe { alloc(stack_layout(size)) }
}

fn heap_free_stack(base: *mut u8, size: usize) {
    if base.is_null() {
        return;
    }
    LIVE_STACKS.fetch_sub(1, Ordering::SeqCst);
    // SAFETY: base came from `heap_alloc_stack` with the same size.
    unsafe { dealloc(base, stack_layout(size)) }
}

static TEST_BRIDGE: SchedBridge = SchedBridge {
    admit: recording_admit,
    withdraw: recording_withdraw,
    alloc_stack: heap_alloc_stack,
    free_stack: heap_free_stack,
};

static ENV_LOCK: StdMutex<()> = StdMutex::new(());

/// Fail stack allocations after `budget` more successes; -1 for unlimited.
pub(crate) fn set_alloc_budget(budget: isize) {
    ALLOC_BUDGET.store(budget, Ordering::SeqCst);
}

pub(crate) fn live_stacks() -> isize {
    LIVE_STACKS.load(Ordering::SeqCst)
}

/// A clean-slate kernel environment for one test. Holds the global lock so
/// tests never interleave; tears the state down again on drop.
pub(crate) struct TestEnv {
    _guard: MutexGuard<'static, ()>,
}

pub(crate) fn setup_test_environment(core_count: usize) -> TestEnv {
    let guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    register_bridge(&TEST_BRIDGE);
    per_core::shutdown_core_registry();
    task::init_task_table();
    ADMITTED.lock().clear();
    WITHDRAWN.lock().clear();
    set_alloc_budget(-1);

    if core_count > 0 {
        per_core::init_core_registry(core_count).expect("core registry init");
    }
    TestEnv { _guard: guard }
}

impl Drop for TestEnv {
    fn drop(&mut self) {
        let _ = task::task_shutdown_all();
        per_core::shutdown_core_registry();
        set_alloc_budget(-1);
    }
}
