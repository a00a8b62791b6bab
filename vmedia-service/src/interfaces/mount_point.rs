// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use zbus::interface;

use crate::state_machine::MountPoint;

/// Read-only description of a slot and its current target.
pub struct MountPointIface {
    slot: Arc<MountPoint>,
}

impl MountPointIface {
    pub fn new(slot: Arc<MountPoint>) -> Self {
        Self { slot }
    }
}

#[interface(name = "xyz.openbmc_project.VirtualMedia.MountPoint")]
impl MountPointIface {
    #[zbus(property)]
    async fn device(&self) -> String {
        self.slot.config().nbd_device.path().display().to_string()
    }

    #[zbus(property)]
    async fn endpoint_id(&self) -> i32 {
        self.slot.config().end_point_id
    }

    #[zbus(property)]
    async fn socket(&self) -> String {
        self.slot.config().unix_socket.display().to_string()
    }

    /// The mounted image URL; empty unless the slot is active.
    #[zbus(property, name = "ImageURL")]
    async fn image_url(&self) -> String {
        self.slot.image_url()
    }

    /// The user the image was mounted with; empty unless the slot is active.
    #[zbus(property)]
    async fn user(&self) -> String {
        self.slot.user()
    }

    #[zbus(property)]
    async fn write_protected(&self) -> bool {
        self.slot.write_protected()
    }
}
