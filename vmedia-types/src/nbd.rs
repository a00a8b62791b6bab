// SPDX-License-Identifier: GPL-3.0-only

//! NBD block-device identity

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Error raised when an NBD device name cannot be parsed
#[derive(Debug, Error, PartialEq, Eq)]
#[error("not an NBD device name: {0:?}")]
pub struct NbdDeviceError(pub String);

/// Identity of a kernel NBD block device (`/dev/nbd<N>`).
///
/// Parsing accepts both the bare kernel name (`nbd3`) and the device node
/// path (`/dev/nbd3`). Two devices compare equal iff their index is equal,
/// which is what the hotplug fan-out keys on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct NbdDevice {
    index: u8,
}

impl NbdDevice {
    pub fn new(index: u8) -> Self {
        Self { index }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// Kernel block-device name, e.g. `nbd0`.
    pub fn id(&self) -> String {
        format!("nbd{}", self.index)
    }

    /// Device node path, e.g. `/dev/nbd0`.
    pub fn path(&self) -> PathBuf {
        PathBuf::from(format!("/dev/nbd{}", self.index))
    }

    /// Sysfs uevent attribute for this device.
    pub fn uevent_path(&self) -> PathBuf {
        PathBuf::from(format!("/sys/block/nbd{}/uevent", self.index))
    }
}

impl fmt::Display for NbdDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nbd{}", self.index)
    }
}

impl FromStr for NbdDevice {
    type Err = NbdDeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("/dev/").unwrap_or(s);
        let index = name
            .strip_prefix("nbd")
            .and_then(|rest| rest.parse::<u8>().ok())
            .ok_or_else(|| NbdDeviceError(s.to_string()))?;
        Ok(Self { index })
    }
}

impl TryFrom<String> for NbdDevice {
    type Error = NbdDeviceError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Block-device lifecycle change reported by the hotplug source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceChange {
    Inserted,
    Removed,
}
