// SPDX-License-Identifier: GPL-3.0-only

//! Service error types and their D-Bus mapping

use thiserror::Error;
use zbus::fdo;

/// Platform error-code vocabulary for activation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unrecognized URL scheme, malformed credential payload.
    InvalidArgument,
    /// Process spawn failed, socket cleanup failed, nbdkit setup failed.
    OperationCanceled,
    /// Mount directory creation failed, child died during activation.
    IoError,
    /// USB gadget configure/remove failed.
    DeviceOrResourceBusy,
    /// Hotplug event inconsistent with state.
    OperationNotSupported,
}

impl ErrorKind {
    pub fn errno(self) -> i32 {
        match self {
            Self::InvalidArgument => libc::EINVAL,
            Self::OperationCanceled => libc::ECANCELED,
            Self::IoError => libc::EIO,
            Self::DeviceOrResourceBusy => libc::EBUSY,
            Self::OperationNotSupported => libc::EOPNOTSUPP,
        }
    }
}

/// Error bound into the Ready state after a failed activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SlotError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Service-specific errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("operation not permitted in current state: {0}")]
    InvalidState(&'static str),

    #[error("malformed credential payload")]
    MalformedCredentials,

    #[error("{} (errno {})", .0.message, .0.kind.errno())]
    Activation(SlotError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for fdo::Error {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidState(reason) => fdo::Error::AccessDenied(reason.to_string()),
            ServiceError::MalformedCredentials => {
                fdo::Error::InvalidArgs("malformed credential payload".to_string())
            }
            ServiceError::Activation(slot_error) => match slot_error.kind {
                ErrorKind::InvalidArgument => fdo::Error::InvalidArgs(slot_error.message),
                kind => fdo::Error::Failed(format!(
                    "errno {}: {}",
                    kind.errno(),
                    slot_error.message
                )),
            },
            ServiceError::Internal(message) => fdo::Error::Failed(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
