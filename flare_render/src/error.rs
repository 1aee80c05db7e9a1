//! Error types for the Flare renderer
//!
//! Recoverable presentation conditions (out-of-date or suboptimal surfaces,
//! minimized windows) never reach this type: they are absorbed by the
//! presentation state machine. Programmer-contract violations go through
//! [`engine_fatal!`](crate::engine_fatal) instead of returning an error.

use std::fmt;

/// Result type for Flare operations
pub type Result<T> = std::result::Result<T, Error>;

/// Flare renderer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backend-specific error (Vulkan call failure, poisoned lock, ...)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (buffer, image, binding set, ...)
    InvalidResource(String),

    /// Initialization failed (device, swapchain, subsystems)
    InitializationFailed(String),

    /// The GPU device was lost; there is no recovery path
    DeviceLost,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::DeviceLost => write!(f, "GPU device lost"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// True for the error classes that must end the render loop
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DeviceLost | Error::OutOfMemory)
    }
}

// ===== ERROR MACROS =====

/// Log an error and build an `Error::BackendError` with the same message
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::flare::Error::BackendError(message)
    }};
}

/// Log an error and return it from the enclosing function
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// Log a warning and build an `Error::BackendError` with the same message
#[macro_export]
macro_rules! engine_warn_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_warn!($source, "{}", message);
        $crate::flare::Error::BackendError(message)
    }};
}

/// Log a warning and return a backend error from the enclosing function
#[macro_export]
macro_rules! engine_bail_warn {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_warn_err!($source, $($arg)*))
    };
}

/// Contract violation: log with location, then abort the current thread
#[macro_export]
macro_rules! engine_fatal {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "FATAL: {}", message);
        panic!("[{}] {}", $source, message)
    }};
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
