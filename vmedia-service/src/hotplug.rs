// SPDX-License-Identifier: GPL-3.0-only

//! Block-device hotplug source
//!
//! Single in-process source of `(device, change)` pairs: the UDisks2 object
//! manager's InterfacesAdded/InterfacesRemoved streams, merged so events stay
//! serialized, reduced to NBD device identities and fanned out to every slot
//! in registration order. Slots discard events for foreign devices.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use zbus::zvariant::{OwnedObjectPath, OwnedValue};

use vmedia_types::{DeviceChange, NbdDevice};

use crate::state_machine::MountPoint;

const UDISKS_NAME: &str = "org.freedesktop.UDisks2";
const UDISKS_PATH: &str = "/org/freedesktop/UDisks2";
const OBJECT_MANAGER_IFACE: &str = "org.freedesktop.DBus.ObjectManager";
const BLOCK_IFACE: &str = "org.freedesktop.UDisks2.Block";

/// Start monitoring block-device events and routing them to `slots`.
pub async fn monitor_device_events(
    connection: zbus::Connection,
    slots: Vec<Arc<MountPoint>>,
) -> zbus::Result<()> {
    tracing::info!("starting block-device hotplug monitoring");

    let object_manager = zbus::Proxy::new(
        &connection,
        UDISKS_NAME,
        UDISKS_PATH,
        OBJECT_MANAGER_IFACE,
    )
    .await?;

    let added = object_manager.receive_signal("InterfacesAdded").await?;
    let removed = object_manager.receive_signal("InterfacesRemoved").await?;

    tokio::spawn(async move {
        let added = added.map(|message| (DeviceChange::Inserted, message));
        let removed = removed.map(|message| (DeviceChange::Removed, message));
        let mut stream = futures_util::stream::select(added, removed);

        while let Some((change, message)) = stream.next().await {
            let Some(device) = device_from_signal(change, &message) else {
                continue;
            };
            tracing::debug!(%device, ?change, "block-device event");
            dispatch(&slots, device, change).await;
        }
        tracing::warn!("hotplug signal stream ended");
    });

    Ok(())
}

/// Deliver one event to every slot, in registration order, off the async
/// workers (gadget configuration blocks).
async fn dispatch(slots: &[Arc<MountPoint>], device: NbdDevice, change: DeviceChange) {
    for slot in slots {
        let slot = slot.clone();
        let delivered =
            tokio::task::spawn_blocking(move || slot.notify_device_change(device, change)).await;
        if delivered.is_err() {
            tracing::error!(%device, "hotplug dispatch task failed");
        }
    }
}

/// Reduce an object-manager signal to an NBD device identity, discarding
/// everything that is not a block device named `nbd<N>`.
fn device_from_signal(change: DeviceChange, message: &zbus::Message) -> Option<NbdDevice> {
    let path = match change {
        DeviceChange::Inserted => {
            let (path, interfaces): (
                OwnedObjectPath,
                HashMap<String, HashMap<String, OwnedValue>>,
            ) = message.body().deserialize().ok()?;
            if !interfaces.contains_key(BLOCK_IFACE) {
                return None;
            }
            path
        }
        DeviceChange::Removed => {
            let (path, interfaces): (OwnedObjectPath, Vec<String>) =
                message.body().deserialize().ok()?;
            if !interfaces.iter().any(|iface| iface == BLOCK_IFACE) {
                return None;
            }
            path
        }
    };
    path.as_str().rsplit('/').next()?.parse().ok()
}
