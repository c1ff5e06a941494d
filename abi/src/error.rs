//! Error types for the task-lifecycle core.

use core::ffi::c_int;

/// Implement common methods for kernel error enums.
///
/// Generates `as_c_int()` and `from_c_int()` for `#[repr(i32)]` error enums
/// that follow the kernel's negative-discriminant convention.
macro_rules! impl_kernel_error {
    ($ty:ty, fallback: $fallback:ident, variants: { $($val:literal => $variant:ident),* $(,)? }) => {
        impl $ty {
            /// Convert to a C-style integer for FFI-adjacent returns.
            #[inline]
            pub fn as_c_int(self) -> c_int {
                self as c_int
            }

            /// Convert from a C-style integer.
            #[inline]
            pub fn from_c_int(val: c_int) -> Self {
                match val {
                    $($val => Self::$variant,)*
                    _ => Self::$fallback,
                }
            }
        }
    };
}

/// Task-lifecycle operation result type.
pub type TaskResult<T> = Result<T, TaskError>;

/// Errors returned by task-lifecycle operations.
///
/// All of these are detected synchronously at the call site and never
/// recovered or retried internally. `AllocationFailure` is environmental;
/// the rest are caller bugs.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskError {
    /// Requested core id is outside the boot-fixed range and is not the
    /// no-affinity sentinel.
    InvalidAffinity = -1,
    /// Query targeted a core id outside the boot-fixed range.
    InvalidCoreId = -2,
    /// Malformed creation argument, out-of-range slot index, or an identity
    /// that is not (or no longer) a live task.
    InvalidArgument = -3,
    /// Storage for the task could not be obtained.
    AllocationFailure = -4,
}

impl_kernel_error!(TaskError, fallback: InvalidArgument, variants: {
    -1 => InvalidAffinity,
    -2 => InvalidCoreId,
    -3 => InvalidArgument,
    -4 => AllocationFailure,
});
