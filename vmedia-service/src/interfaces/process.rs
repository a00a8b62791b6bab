// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use zbus::interface;

use crate::state_machine::MountPoint;

/// Helper-process view of a slot.
pub struct ProcessIface {
    slot: Arc<MountPoint>,
}

impl ProcessIface {
    pub fn new(slot: Arc<MountPoint>) -> Self {
        Self { slot }
    }
}

#[interface(name = "xyz.openbmc_project.VirtualMedia.Process")]
impl ProcessIface {
    #[zbus(property)]
    async fn active(&self) -> bool {
        self.slot.is_active()
    }

    /// Exit code of the last helper process, -1 when none has run yet.
    #[zbus(property)]
    async fn exit_code(&self) -> i32 {
        self.slot.exit_code()
    }

    #[zbus(property, name = "CDInstance")]
    async fn cd_instance(&self) -> i32 {
        self.slot.cd_instance()
    }

    #[zbus(property, name = "CDInstance")]
    async fn set_cd_instance(&mut self, value: i32) {
        self.slot.set_cd_instance(value);
    }
}
