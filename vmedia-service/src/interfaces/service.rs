// SPDX-License-Identifier: GPL-3.0-only

//! Mode-specific Mount/Unmount service interfaces
//!
//! Both flavors are cooperative: they dispatch the event into the slot's
//! state machine, then poll its state for up to twelve seconds. Invalid-state
//! rejections surface as permission-denied; activation failures carry their
//! errno-backed error kind.

use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};
use std::sync::Arc;

use zbus::zvariant::Value;
use zbus::{fdo, interface};

use vmedia_sys::{read_secret_payload, Credentials, SysError};

use crate::error::ServiceError;
use crate::state_machine::{MountPoint, Target};

/// Service interface of a proxy-mode slot.
pub struct ProxyService {
    slot: Arc<MountPoint>,
}

impl ProxyService {
    pub fn new(slot: Arc<MountPoint>) -> Self {
        Self { slot }
    }
}

#[interface(name = "xyz.openbmc_project.VirtualMedia.Proxy")]
impl ProxyService {
    async fn mount(&self) -> fdo::Result<bool> {
        tracing::info!(slot = %self.slot.name(), "mount requested");
        self.slot.mount(Target::proxy()).await.map_err(fdo::Error::from)
    }

    async fn unmount(&self) -> fdo::Result<bool> {
        tracing::info!(slot = %self.slot.name(), "unmount requested");
        self.slot.unmount().await.map_err(fdo::Error::from)
    }
}

/// Service interface of a legacy-mode slot.
pub struct LegacyService {
    slot: Arc<MountPoint>,
}

impl LegacyService {
    pub fn new(slot: Arc<MountPoint>) -> Self {
        Self { slot }
    }
}

#[interface(name = "xyz.openbmc_project.VirtualMedia.Legacy")]
impl LegacyService {
    async fn mount(
        &self,
        img_url: String,
        rw: bool,
        extra: Value<'_>,
    ) -> fdo::Result<bool> {
        tracing::info!(slot = %self.slot.name(), url = %img_url, rw, "mount requested");

        let credentials = match &extra {
            Value::Fd(fd) => Some(read_credentials(fd.as_fd().as_raw_fd()).await?),
            _ => None,
        };

        let target = Target::remote(img_url, rw, credentials);
        self.slot.mount(target).await.map_err(fdo::Error::from)
    }

    async fn unmount(&self) -> fdo::Result<bool> {
        tracing::info!(slot = %self.slot.name(), "unmount requested");
        self.slot.unmount().await.map_err(fdo::Error::from)
    }
}

/// Read `user\0password\0` off the credential pipe.
///
/// The descriptor only lives for the duration of the method call, so it is
/// duplicated before the read moves to the blocking pool. The payload buffer
/// is scrubbed as soon as the fields are parsed out.
async fn read_credentials(fd: std::os::fd::RawFd) -> fdo::Result<Credentials> {
    let dup = nix::unistd::dup(fd)
        .map_err(|e| fdo::Error::Failed(format!("cannot duplicate credential pipe: {e}")))?;
    // SAFETY: dup() just handed us sole ownership of this descriptor.
    let owned = unsafe { OwnedFd::from_raw_fd(dup) };

    tokio::task::spawn_blocking(move || {
        let payload = read_secret_payload(owned.as_raw_fd()).map_err(|e| match e {
            SysError::MalformedSecret => ServiceError::MalformedCredentials,
            other => ServiceError::Internal(format!("credential pipe read failed: {other}")),
        })?;
        Credentials::from_payload(&payload).map_err(|_| ServiceError::MalformedCredentials)
    })
    .await
    .map_err(|e| fdo::Error::Failed(format!("dispatch task failed: {e}")))?
    .map_err(fdo::Error::from)
}
