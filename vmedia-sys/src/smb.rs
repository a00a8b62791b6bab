// SPDX-License-Identifier: GPL-3.0-only

//! CIFS share mounting for legacy-mode slots
//!
//! The mount directory lives under the system temp root and is named from
//! the slot, so one slot owns at most one directory. The option string may
//! embed a plaintext password and is therefore built in a scrubbed buffer.

use std::path::{Path, PathBuf};

use nix::mount::{mount, umount, MsFlags};
use zeroize::Zeroizing;

use crate::error::{Result, SysError};
use crate::secret::Credentials;

/// Share-mount and socket-housekeeping operations.
pub trait ShareOps: Send + Sync {
    /// Create (or reuse) the slot's mount directory and return its path.
    fn create_mount_dir(&self, slot: &str) -> Result<PathBuf>;

    /// Mount `remote` (a `//host/share` path) at `dir`.
    fn mount(
        &self,
        remote: &str,
        dir: &Path,
        rw: bool,
        credentials: Option<&Credentials>,
    ) -> Result<()>;

    /// Unmount `dir` if mounted and remove the directory.
    fn unmount(&self, dir: &Path) -> Result<()>;

    /// Remove a stale listening socket left over from a previous run.
    fn remove_stale_socket(&self, socket: &Path) -> Result<()>;
}

/// Real CIFS implementation using `mount(2)`.
pub struct SmbShare {
    mount_root: PathBuf,
}

impl SmbShare {
    pub fn new() -> Self {
        Self {
            mount_root: std::env::temp_dir(),
        }
    }

    pub fn with_root(mount_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
        }
    }
}

impl Default for SmbShare {
    fn default() -> Self {
        Self::new()
    }
}

impl ShareOps for SmbShare {
    fn create_mount_dir(&self, slot: &str) -> Result<PathBuf> {
        let dir = self.mount_root.join(format!("virtual-media-{slot}"));
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn mount(
        &self,
        remote: &str,
        dir: &Path,
        rw: bool,
        credentials: Option<&Credentials>,
    ) -> Result<()> {
        let mut options = Zeroizing::new(String::from(if rw { "rw" } else { "ro" }));
        options.push_str(",vers=3.0,seal");
        match credentials {
            Some(creds) => {
                options.push_str(",username=");
                options.push_str(creds.user());
                options.push_str(",password=");
                options.push_str(creds.password());
            }
            None => options.push_str(",guest"),
        }

        mount(
            Some(remote),
            dir,
            Some("cifs"),
            MsFlags::empty(),
            Some(options.as_str()),
        )
        .map_err(|e| SysError::Mount(format!("mounting {remote}: {e}")))?;
        tracing::info!(remote, dir = %dir.display(), rw, "CIFS share mounted");
        Ok(())
    }

    fn unmount(&self, dir: &Path) -> Result<()> {
        if let Err(e) = umount(dir) {
            // EINVAL means the directory was never mounted, which is the
            // normal rollback path after a failed mount.
            if e != nix::errno::Errno::EINVAL && e != nix::errno::Errno::ENOENT {
                tracing::warn!(dir = %dir.display(), error = %e, "unmount failed");
            }
        }
        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        tracing::debug!(dir = %dir.display(), "mount directory removed");
        Ok(())
    }

    fn remove_stale_socket(&self, socket: &Path) -> Result<()> {
        if socket.exists() {
            tracing::debug!(socket = %socket.display(), "removing pre-existing socket");
            std::fs::remove_file(socket)?;
        }
        Ok(())
    }
}
