// SPDX-License-Identifier: GPL-3.0-only

//! Per-slot D-Bus interfaces
//!
//! Three interfaces are served at each slot's object path: the read-only
//! MountPoint description, the Process view, and the mode-specific service
//! interface carrying Mount/Unmount.

mod mount_point;
mod process;
mod service;

pub use mount_point::MountPointIface;
pub use process::ProcessIface;
pub use service::{LegacyService, ProxyService};
