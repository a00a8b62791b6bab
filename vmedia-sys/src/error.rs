// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to spawn {binary}: {reason}")]
    Spawn { binary: String, reason: String },

    #[error("gadget operation failed: {0}")]
    Gadget(String),

    #[error("mount operation failed: {0}")]
    Mount(String),

    #[error("malformed secret payload")]
    MalformedSecret,
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
