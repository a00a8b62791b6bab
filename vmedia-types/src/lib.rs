// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain types for the virtual-media daemon
//!
//! This crate defines the single source of truth for the types shared across
//! the stack:
//!
//! - **vmedia-sys**: consumes [`NbdDevice`] when driving the gadget and the
//!   helper processes
//! - **vmedia-service**: consumes [`Configuration`] to build one mount slot
//!   per configured entry
//!
//! Nothing here performs privileged work; the only I/O is reading the
//! configuration file once at startup.

pub mod config;
pub mod nbd;

pub use config::{ConfigError, Configuration, Mode, MountConfig};
pub use nbd::{DeviceChange, NbdDevice, NbdDeviceError};
