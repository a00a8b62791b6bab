// SPDX-License-Identifier: GPL-3.0-only

//! Notification fan-out for slot lifecycle events
//!
//! The state machine publishes resource notifications here; the forwarder
//! task renders them to the structured log (the seam where an external
//! event/redfish sink would attach). Tests subscribe to verify ordering.

use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Slot lifecycle notifications, carrying the slot's bus object path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ResourceCreated { object_path: String },
    ResourceDeleted { object_path: String },
}

/// Broadcast bus distributing [`AppEvent`]s to all subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all subscribers.
    ///
    /// Fire-and-forget: with no subscribers the event is dropped.
    pub fn publish(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    /// Park a task rendering every event to the log.
    pub fn spawn_log_forwarder(&self) {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(AppEvent::ResourceCreated { object_path }) => {
                        tracing::info!(%object_path, "resource created");
                    }
                    Ok(AppEvent::ResourceDeleted { object_path }) => {
                        tracing::info!(%object_path, "resource deleted");
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "notification forwarder lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
