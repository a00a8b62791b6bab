// SPDX-License-Identifier: GPL-3.0-only

//! Daemon configuration
//!
//! Read once at startup from a fixed path. Each entry describes one mount
//! slot; the set is immutable for the lifetime of the process. Loading fails
//! fast on malformed entries or on two slots claiming the same NBD device or
//! listening socket, since those resources are owned exclusively by a single
//! slot for a whole mount cycle.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::nbd::NbdDevice;

/// Default location of the configuration file.
pub const DEFAULT_PATH: &str = "/etc/virtual-media.json";

const DEFAULT_TIMEOUT_SECS: u32 = 30;
const DEFAULT_BLOCKSIZE: u32 = 512;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("slots {first:?} and {second:?} share {resource}")]
    DuplicateResource {
        first: String,
        second: String,
        resource: String,
    },
}

/// How a slot obtains its NBD server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// The NBD server is external; the daemon only binds `nbd-client`.
    Proxy,
    /// The daemon spawns `nbdkit` as the NBD server.
    Legacy,
}

/// Configuration of a single mount slot.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountConfig {
    pub mode: Mode,
    pub nbd_device: NbdDevice,
    pub unix_socket: PathBuf,
    pub end_point_id: i32,
    #[serde(default)]
    pub timeout: Option<u32>,
    #[serde(default)]
    pub blocksize: Option<u32>,
    /// Pass `--verbose` to nbdkit. Swarm of debug logs; off by default.
    #[serde(default)]
    pub verbose_nbdkit_logs: bool,
}

impl MountConfig {
    /// `nbd-client` argv binding the slot's socket to its device node.
    ///
    /// `-n` keeps the client in the foreground so the supervisor observes
    /// its exit.
    pub fn nbd_client_args(&self) -> Vec<String> {
        vec![
            "-t".into(),
            self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS).to_string(),
            "-b".into(),
            self.blocksize.unwrap_or(DEFAULT_BLOCKSIZE).to_string(),
            "-u".into(),
            self.unix_socket.display().to_string(),
            self.nbd_device.path().display().to_string(),
            "-n".into(),
        ]
    }
}

/// The full slot table, keyed by slot name.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    pub mount_points: BTreeMap<String, MountConfig>,
}

impl Configuration {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Configuration =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut devices: BTreeMap<NbdDevice, &str> = BTreeMap::new();
        let mut socket_owner: BTreeMap<&Path, &str> = BTreeMap::new();

        for (name, entry) in &self.mount_points {
            if let Some(prev) = devices.insert(entry.nbd_device, name) {
                return Err(ConfigError::DuplicateResource {
                    first: prev.to_string(),
                    second: name.clone(),
                    resource: format!("NBD device {}", entry.nbd_device),
                });
            }
            if let Some(prev) = socket_owner.insert(entry.unix_socket.as_path(), name) {
                return Err(ConfigError::DuplicateResource {
                    first: prev.to_string(),
                    second: name.clone(),
                    resource: format!("socket {}", entry.unix_socket.display()),
                });
            }
        }
        Ok(())
    }
}
