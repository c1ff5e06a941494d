//! Freestanding utility crate for the Kestrel task-lifecycle core.
//!
//! Everything here is platform-independent: atomic init-once flags and the
//! kernel logging front-end. Hardware back-ends (serial, framebuffer) belong
//! to the surrounding kernel and attach through `klog_set_sink`.

#![no_std]
#![forbid(unsafe_op_in_unsafe_fn)]

#[cfg(test)]
extern crate std;

pub mod init_flag;
pub mod klog;

pub use init_flag::InitFlag;
pub use klog::{
    klog_get_level, klog_init, klog_is_enabled, klog_set_level, klog_set_sink, KlogLevel,
    KlogSink,
};
