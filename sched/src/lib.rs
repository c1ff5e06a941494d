//! Kestrel SMP task-lifecycle core.
//!
//! This crate is the task-lifecycle extension of a preemptive SMP kernel:
//! creating tasks bound to a specific core (or unbound), querying per-core
//! task identity, querying a task's affinity, and running local-storage
//! cleanup callbacks at deletion.
//!
//! Scheduling policy, stack memory, and context switching stay outside: the
//! surrounding kernel reaches in through [`bridge::SchedBridge`] (ready-list
//! admission, stack allocation) and feeds context-switch events into
//! [`per_core`].

#![no_std]
#![forbid(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
extern crate std;

pub mod bridge;
pub mod local_storage;
pub mod per_core;
pub mod task;

pub use bridge::{register_bridge, SchedBridge};
pub use local_storage::{task_drain_local_storage, task_local_storage, task_set_local_storage};
pub use per_core::{
    core_count, current_task_on, idle_task_on, init_core_registry, record_context_switch,
    shutdown_core_registry,
};
pub use task::{
    init_task_table, task_affinity, task_create, task_create_static, task_delete, task_name,
    task_priority, task_shutdown_all, task_state, task_stats, TaskStats,
};

#[cfg(test)]
mod test_support;
