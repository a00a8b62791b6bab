// SPDX-License-Identifier: GPL-3.0-only

//! Slot registry and bus wiring

use std::sync::Arc;

use anyhow::Result;
use zbus::connection::Builder as ConnectionBuilder;

use vmedia_types::Configuration;

use crate::events::EventBus;
use crate::hotplug;
use crate::platform::Platform;
use crate::state_machine::{MountPoint, BUS_NAME, ROOT_PATH};

/// The running daemon: one state machine per configured slot, published on
/// the system bus, fed by the hotplug listener.
pub struct App {
    connection: zbus::Connection,
    slots: Vec<Arc<MountPoint>>,
}

impl App {
    pub async fn start(config: Configuration, platform: Platform) -> Result<Self> {
        let events = EventBus::new();
        events.spawn_log_forwarder();

        let connection = ConnectionBuilder::system()?
            .name(BUS_NAME)?
            .serve_at(ROOT_PATH, zbus::fdo::ObjectManager)?
            .build()
            .await?;
        tracing::info!(name = BUS_NAME, "service registered on D-Bus system bus");

        let slots: Vec<Arc<MountPoint>> = config
            .mount_points
            .iter()
            .map(|(name, entry)| {
                Arc::new(MountPoint::new(
                    name.clone(),
                    entry.clone(),
                    platform.clone(),
                    events.clone(),
                ))
            })
            .collect();

        for slot in &slots {
            slot.register(&connection).await?;
        }

        hotplug::monitor_device_events(connection.clone(), slots.clone()).await?;

        tracing::info!(slots = slots.len(), "virtual media service ready");
        Ok(Self { connection, slots })
    }

    pub fn connection(&self) -> &zbus::Connection {
        &self.connection
    }

    pub fn slots(&self) -> &[Arc<MountPoint>] {
        &self.slots
    }
}
