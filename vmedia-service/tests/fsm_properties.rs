// SPDX-License-Identifier: GPL-3.0-only

//! Property tests over arbitrary event sequences.
//!
//! The slot is driven synchronously against mock adapters; exits are
//! delivered through the mock supervisor the way the real exit-waiter would
//! deliver them. After every step the structural invariants must hold.

mod support;

use proptest::prelude::*;

use vmedia_service::{AppEvent, Event, ServiceError, StateKind, Target};
use vmedia_sys::Credentials;
use vmedia_types::{DeviceChange, Mode, NbdDevice};

#[derive(Debug, Clone)]
enum MountKind {
    Proxy,
    Https,
    HttpsWithCreds,
    Smb,
    BadScheme,
}

#[derive(Debug, Clone)]
enum Action {
    RegisterBus,
    Mount(MountKind),
    Unmount,
    DeliverExit(i32),
    DeviceInserted,
    DeviceRemoved,
    ForeignDeviceInserted,
}

fn target_for(kind: &MountKind) -> Target {
    let credentials = || Credentials::from_payload(b"alice\0pw\0").unwrap();
    match kind {
        MountKind::Proxy => Target::proxy(),
        MountKind::Https => Target::remote("https://host/image.iso".to_string(), false, None),
        MountKind::HttpsWithCreds => {
            Target::remote("https://host/image.iso".to_string(), true, Some(credentials()))
        }
        MountKind::Smb => {
            Target::remote("smb://host/share/image.iso".to_string(), true, Some(credentials()))
        }
        MountKind::BadScheme => Target::remote("ftp://host/image.iso".to_string(), false, None),
    }
}

fn action_strategy() -> impl Strategy<Value = Action> {
    let mount = prop_oneof![
        Just(MountKind::Proxy),
        Just(MountKind::Https),
        Just(MountKind::HttpsWithCreds),
        Just(MountKind::Smb),
        Just(MountKind::BadScheme),
    ];
    prop_oneof![
        1 => Just(Action::RegisterBus),
        4 => mount.prop_map(Action::Mount),
        4 => Just(Action::Unmount),
        3 => (0i32..256).prop_map(Action::DeliverExit),
        3 => Just(Action::DeviceInserted),
        2 => Just(Action::DeviceRemoved),
        1 => Just(Action::ForeignDeviceInserted),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(192))]

    #[test]
    fn invariants_hold_for_arbitrary_event_sequences(
        legacy in any::<bool>(),
        actions in proptest::collection::vec(action_strategy(), 1..48),
    ) {
        let mode = if legacy { Mode::Legacy } else { Mode::Proxy };
        let (slot, platform, events) = support::slot(mode);
        let mut rx = events.subscribe();
        let mut created = 0usize;
        let mut deleted = 0usize;

        for action in &actions {
            let before = slot.status();
            match action {
                Action::RegisterBus => {
                    let _ = slot.emit(Event::RegisterBus);
                }
                Action::Mount(kind) => {
                    let result = slot.emit(Event::Mount { target: target_for(kind) });
                    if before.state != StateKind::Ready {
                        // Protocol violation: rejected, nothing changed.
                        prop_assert!(matches!(result, Err(ServiceError::InvalidState(_))));
                        prop_assert_eq!(slot.status(), before.clone());
                    } else {
                        prop_assert!(result.is_ok());
                    }
                }
                Action::Unmount => {
                    let result = slot.emit(Event::Unmount);
                    let rejected = matches!(
                        before.state,
                        StateKind::Initial | StateKind::Ready | StateKind::WaitingForProcessEnd
                    );
                    if rejected {
                        prop_assert!(matches!(result, Err(ServiceError::InvalidState(_))));
                        prop_assert_eq!(slot.status(), before.clone());
                    } else {
                        prop_assert!(result.is_ok());
                    }
                }
                Action::DeliverExit(code) => {
                    platform.supervisor.finish_next(*code);
                }
                Action::DeviceInserted => {
                    slot.notify_device_change(NbdDevice::new(0), DeviceChange::Inserted);
                }
                Action::DeviceRemoved => {
                    slot.notify_device_change(NbdDevice::new(0), DeviceChange::Removed);
                }
                Action::ForeignDeviceInserted => {
                    slot.notify_device_change(NbdDevice::new(7), DeviceChange::Inserted);
                    prop_assert_eq!(slot.status(), before.clone());
                }
            }

            let status = slot.status();

            // A target exists iff the slot is mid-cycle.
            prop_assert_eq!(
                status.has_target,
                !matches!(status.state, StateKind::Initial | StateKind::Ready),
                "state {:?}", status.state
            );

            // At most one helper running at any observable moment.
            prop_assert!(platform.supervisor.live_count() <= 1);

            // Credentials never survive activation.
            prop_assert!(!slot.holds_credentials());

            // Every deletion notice is covered by an earlier creation.
            while let Ok(event) = rx.try_recv() {
                match event {
                    AppEvent::ResourceCreated { .. } => created += 1,
                    AppEvent::ResourceDeleted { .. } => deleted += 1,
                }
                prop_assert!(deleted <= created);
            }
        }
    }

    /// A slot that never reached Active produces no notifications at all.
    #[test]
    fn no_notifications_without_reaching_active(
        legacy in any::<bool>(),
        actions in proptest::collection::vec(action_strategy(), 1..32),
    ) {
        let mode = if legacy { Mode::Legacy } else { Mode::Proxy };
        let (slot, platform, events) = support::slot(mode);
        let mut rx = events.subscribe();
        let mut reached_active = false;

        for action in &actions {
            match action {
                Action::RegisterBus => {
                    let _ = slot.emit(Event::RegisterBus);
                }
                Action::Mount(kind) => {
                    let _ = slot.emit(Event::Mount { target: target_for(kind) });
                }
                Action::Unmount => {
                    let _ = slot.emit(Event::Unmount);
                }
                Action::DeliverExit(code) => {
                    platform.supervisor.finish_next(*code);
                }
                Action::DeviceInserted => {
                    slot.notify_device_change(NbdDevice::new(0), DeviceChange::Inserted);
                }
                Action::DeviceRemoved => {
                    slot.notify_device_change(NbdDevice::new(0), DeviceChange::Removed);
                }
                Action::ForeignDeviceInserted => {
                    slot.notify_device_change(NbdDevice::new(7), DeviceChange::Inserted);
                }
            }
            reached_active |= slot.status().state == StateKind::Active;
        }

        if !reached_active {
            prop_assert!(rx.try_recv().is_err());
        }
    }
}
