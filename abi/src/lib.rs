//! Kestrel Task-Lifecycle ABI Types
//!
//! This crate provides the canonical definitions for all types shared between
//! the task-lifecycle core and the surrounding kernel. Having a single source
//! of truth eliminates:
//! - Duplicate type definitions across scheduler crates
//! - Mismatches between the creation service and the admission layer
//!
//! Structural types in this crate are `#[repr(C)]` for ABI stability.

#![no_std]
#![forbid(unsafe_code)]

pub mod affinity;
pub mod error;
pub mod task;

pub use affinity::*;
pub use error::*;
pub use task::*;
