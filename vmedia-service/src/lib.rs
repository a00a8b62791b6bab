// SPDX-License-Identifier: GPL-3.0-only

//! Virtual media D-Bus service
//!
//! Exposes remote disk images as local block devices and publishes them to
//! the attached host as USB mass storage. Each configured slot is an
//! independent state machine coordinating the NBD helper processes, the
//! block-device hotplug stream, the USB gadget and the D-Bus surface.

pub mod app;
pub mod error;
pub mod events;
pub mod hotplug;
pub mod interfaces;
pub mod platform;
pub mod state_machine;

pub use app::App;
pub use error::{ErrorKind, ServiceError, SlotError};
pub use events::{AppEvent, EventBus};
pub use platform::Platform;
pub use state_machine::{Event, MountPoint, StateKind, Status, Target, BUS_NAME, ROOT_PATH};
