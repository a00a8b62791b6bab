// SPDX-License-Identifier: GPL-3.0-only

//! Low-level system operations for the virtual-media daemon
//!
//! This crate provides the privileged plumbing the mount state machine is
//! built on:
//!
//! - Child-process supervision for the NBD helper binaries
//! - USB mass-storage gadget configuration through configfs
//! - CIFS share mounting and teardown
//! - Scrubbed credential buffers and volatile secret files
//!
//! Each concern is exposed behind a small trait so the state machine can be
//! exercised against test doubles; the real implementations here are the only
//! code in the workspace that touches the kernel.

pub mod error;
pub mod gadget;
pub mod process;
pub mod secret;
pub mod smb;

pub use error::{Result, SysError};
pub use gadget::{GadgetOps, UsbGadget};
pub use process::{ExitHandler, ProcessHandle, ProcessOps, Supervisor};
pub use secret::{read_secret_payload, Credentials, VolatileFile, SECRET_LIMIT};
pub use smb::{ShareOps, SmbShare};
