// SPDX-License-Identifier: GPL-3.0-only

//! Per-slot mount lifecycle state machine
//!
//! One [`MountPoint`] per configured slot. Every external actor (bus method
//! handlers, the hotplug listener, process-exit callbacks) funnels its
//! observations into [`MountPoint::emit`], which performs the transition and
//! the new state's entry action atomically under the slot mutex. Nothing can
//! interleave between a state change and its entry action, which the
//! activation pipeline relies on.
//!
//! State/event pairs not listed in the transition tables are protocol
//! violations: externally-originated events are rejected with a
//! permission-denied error, internally-originated ones are logged and the
//! state is preserved.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use vmedia_sys::{Credentials, ExitHandler, ProcessHandle, VolatileFile};
use vmedia_types::{DeviceChange, Mode, MountConfig, NbdDevice};

use crate::error::{ErrorKind, ServiceError, SlotError};
use crate::events::{AppEvent, EventBus};
use crate::platform::Platform;

/// Well-known bus name of the daemon.
pub const BUS_NAME: &str = "xyz.openbmc_project.VirtualMedia";
/// Root of the object tree; the object manager lives here.
pub const ROOT_PATH: &str = "/xyz/openbmc_project/VirtualMedia";

const NBD_CLIENT: &str = "/usr/sbin/nbd-client";
const NBDKIT: &str = "/usr/sbin/nbdkit";

/// Cooperative wait bound for the bus-facing Mount/Unmount calls:
/// 120 rounds of 100 ms.
const WAIT_ROUNDS: u32 = 120;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The image being mounted, present exactly while the slot is anywhere
/// between Activating and the return to Ready.
pub struct Target {
    pub img_url: String,
    pub rw: bool,
    /// Set once a CIFS share is mounted for this target.
    pub mount_dir: Option<PathBuf>,
    /// Remembered for the User property after the credentials are consumed.
    pub user: Option<String>,
    pub credentials: Option<Credentials>,
}

impl Target {
    /// Proxy-mode target: the backing server is external, there is no URL.
    pub fn proxy() -> Self {
        Self {
            img_url: String::new(),
            rw: false,
            mount_dir: None,
            user: None,
            credentials: None,
        }
    }

    pub fn remote(img_url: String, rw: bool, credentials: Option<Credentials>) -> Self {
        let user = credentials.as_ref().map(|c| c.user().to_string());
        Self {
            img_url,
            rw,
            mount_dir: None,
            user,
            credentials,
        }
    }
}

/// Discriminant of [`State`], used for observation and the poll loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Initial,
    Ready,
    Activating,
    WaitingForGadget,
    Active,
    WaitingForProcessEnd,
}

impl StateKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Initial => "Initial",
            Self::Ready => "Ready",
            Self::Activating => "Activating",
            Self::WaitingForGadget => "WaitingForGadget",
            Self::Active => "Active",
            Self::WaitingForProcessEnd => "WaitingForProcessEnd",
        }
    }
}

enum State {
    Initial,
    Ready {
        error: Option<SlotError>,
    },
    Activating,
    WaitingForGadget {
        process: Weak<dyn ProcessHandle>,
    },
    Active {
        process: Weak<dyn ProcessHandle>,
    },
    WaitingForProcessEnd {
        #[allow(dead_code)]
        process: Weak<dyn ProcessHandle>,
    },
}

impl State {
    fn kind(&self) -> StateKind {
        match self {
            Self::Initial => StateKind::Initial,
            Self::Ready { .. } => StateKind::Ready,
            Self::Activating => StateKind::Activating,
            Self::WaitingForGadget { .. } => StateKind::WaitingForGadget,
            Self::Active { .. } => StateKind::Active,
            Self::WaitingForProcessEnd { .. } => StateKind::WaitingForProcessEnd,
        }
    }

    fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// Events routed through [`MountPoint::emit`].
pub enum Event {
    /// The slot's bus surface has been published.
    RegisterBus,
    Mount { target: Target },
    Unmount,
    /// Self-dispatched on entry to Activating.
    ActivationStarted,
    SubprocessStopped,
    DeviceChanged { change: DeviceChange },
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Self::RegisterBus => "RegisterBus",
            Self::Mount { .. } => "Mount",
            Self::Unmount => "Unmount",
            Self::ActivationStarted => "ActivationStarted",
            Self::SubprocessStopped => "SubprocessStopped",
            Self::DeviceChanged { .. } => "DeviceChanged",
        }
    }
}

/// Observable snapshot of a slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub state: StateKind,
    pub error: Option<SlotError>,
    pub has_target: bool,
    pub exit_code: i32,
}

struct Inner {
    state: State,
    target: Option<Target>,
    exit_code: i32,
}

/// One mount slot: owns the target, the state and the slot's share of the
/// system adapters.
pub struct MountPoint {
    name: String,
    config: MountConfig,
    platform: Platform,
    events: EventBus,
    inner: Mutex<Inner>,
    cd_instance: AtomicI32,
}

impl MountPoint {
    pub fn new(name: String, config: MountConfig, platform: Platform, events: EventBus) -> Self {
        Self {
            name,
            config,
            platform,
            events,
            inner: Mutex::new(Inner {
                state: State::Initial,
                target: None,
                exit_code: -1,
            }),
            cd_instance: AtomicI32::new(2),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &MountConfig {
        &self.config
    }

    pub fn object_path(&self) -> String {
        let flavor = match self.config.mode {
            Mode::Proxy => "Proxy",
            Mode::Legacy => "Legacy",
        };
        format!("{ROOT_PATH}/{flavor}/{}", self.name)
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ---- Observation -----------------------------------------------------

    pub fn status(&self) -> Status {
        let inner = self.lock_inner();
        let error = match &inner.state {
            State::Ready { error } => error.clone(),
            _ => None,
        };
        Status {
            state: inner.state.kind(),
            error,
            has_target: inner.target.is_some(),
            exit_code: inner.exit_code,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.lock_inner().state, State::Active { .. })
    }

    pub fn exit_code(&self) -> i32 {
        self.lock_inner().exit_code
    }

    /// Image URL, revealed only while Active; empty otherwise (and always
    /// empty in proxy mode).
    pub fn image_url(&self) -> String {
        let inner = self.lock_inner();
        match (&inner.state, &inner.target) {
            (State::Active { .. }, Some(target)) => target.img_url.clone(),
            _ => String::new(),
        }
    }

    /// User the share was mounted with, revealed only while Active.
    pub fn user(&self) -> String {
        let inner = self.lock_inner();
        match (&inner.state, &inner.target) {
            (State::Active { .. }, Some(target)) => target.user.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }

    /// Write protection as presented to the host; absent target reads as
    /// protected.
    pub fn write_protected(&self) -> bool {
        self.lock_inner()
            .target
            .as_ref()
            .map(|t| !t.rw)
            .unwrap_or(true)
    }

    /// True while the target still holds an unconsumed credential handle.
    /// Activation drops the handle on success and error paths alike.
    pub fn holds_credentials(&self) -> bool {
        self.lock_inner()
            .target
            .as_ref()
            .map(|t| t.credentials.is_some())
            .unwrap_or(false)
    }

    pub fn cd_instance(&self) -> i32 {
        self.cd_instance.load(Ordering::Relaxed)
    }

    pub fn set_cd_instance(&self, value: i32) {
        self.cd_instance.store(value, Ordering::Relaxed);
    }

    // ---- Event entry points ---------------------------------------------

    /// Route a hotplug observation to this slot; events for foreign devices
    /// are discarded without side effects.
    pub fn notify_device_change(self: &Arc<Self>, device: NbdDevice, change: DeviceChange) {
        if device != self.config.nbd_device {
            tracing::trace!(slot = %self.name, %device, "ignoring foreign device event");
            return;
        }
        let _ = self.emit(Event::DeviceChanged { change });
    }

    /// Record a helper exit and route the stop event.
    pub fn subprocess_stopped(self: &Arc<Self>, exit_code: i32) {
        self.lock_inner().exit_code = exit_code;
        let _ = self.emit(Event::SubprocessStopped);
    }

    /// Dispatch an event: transition plus entry action, atomically.
    ///
    /// Synchronous end-to-end; entry actions that self-dispatch do so through
    /// the follow-up loop rather than recursion.
    pub fn emit(self: &Arc<Self>, event: Event) -> Result<(), ServiceError> {
        let mut inner = self.lock_inner();
        let mut next = Some(event);
        while let Some(event) = next.take() {
            tracing::debug!(
                slot = %self.name,
                state = inner.state.name(),
                event = event.name(),
                "dispatching event"
            );
            next = self.step(&mut inner, event)?;
        }
        Ok(())
    }

    // ---- Transitions -----------------------------------------------------

    fn step(
        self: &Arc<Self>,
        inner: &mut Inner,
        event: Event,
    ) -> Result<Option<Event>, ServiceError> {
        let state = std::mem::replace(&mut inner.state, State::Initial);
        let (next, follow) = match (state, event) {
            // Bus registration closes the Initial state.
            (State::Initial, Event::RegisterBus) => {
                // A device node that predates the daemon will not hotplug by
                // itself; poke a change event for it.
                self.platform
                    .gadget()
                    .trigger_udev_change(&self.config.nbd_device);
                (self.enter_ready(inner, None), None)
            }
            (state, Event::RegisterBus) => {
                tracing::error!(
                    slot = %self.name,
                    state = state.name(),
                    "bus registration outside Initial; resetting slot"
                );
                match &state {
                    State::Active { process } => {
                        let _ = self.platform.gadget().remove(&self.name);
                        self.stop_process(process);
                    }
                    State::WaitingForGadget { process }
                    | State::WaitingForProcessEnd { process } => self.stop_process(process),
                    _ => {}
                }
                self.cleanup_target(inner);
                (State::Initial, None)
            }

            (State::Ready { .. }, Event::Mount { target }) => {
                inner.target = Some(target);
                // Entry to Activating: clear the previous exit code and
                // self-dispatch the activation.
                inner.exit_code = -1;
                (State::Activating, Some(Event::ActivationStarted))
            }
            (state, Event::Mount { .. }) => {
                inner.state = state;
                return Err(ServiceError::InvalidState("cannot mount on a busy slot"));
            }

            (State::Activating, Event::ActivationStarted) => (self.activate(inner), None),

            (State::Activating, Event::Unmount) => (self.enter_ready(inner, None), None),
            (State::WaitingForGadget { process }, Event::Unmount) => {
                self.stop_process(&process);
                (State::WaitingForProcessEnd { process }, None)
            }
            (State::Active { process }, Event::Unmount) => {
                if let Err(e) = self.platform.gadget().remove(&self.name) {
                    tracing::error!(
                        slot = %self.name,
                        error = %e,
                        "gadget removal failed on unmount; slot parked in ready"
                    );
                    let error =
                        SlotError::new(ErrorKind::DeviceOrResourceBusy, "unable to unmount gadget");
                    (self.enter_ready(inner, Some(error)), None)
                } else {
                    self.stop_process(&process);
                    self.events.publish(AppEvent::ResourceDeleted {
                        object_path: self.object_path(),
                    });
                    (State::WaitingForProcessEnd { process }, None)
                }
            }
            (state, Event::Unmount) => {
                inner.state = state;
                return Err(ServiceError::InvalidState("cannot unmount an empty slot"));
            }

            (State::Activating, Event::SubprocessStopped) => {
                (self.enter_ready(inner, None), None)
            }
            (State::WaitingForGadget { process }, Event::SubprocessStopped) => {
                self.stop_process(&process);
                let error = SlotError::new(ErrorKind::IoError, "process ended prematurely");
                (self.enter_ready(inner, Some(error)), None)
            }
            (State::Active { .. }, Event::SubprocessStopped) => {
                if let Err(e) = self.platform.gadget().remove(&self.name) {
                    tracing::error!(
                        slot = %self.name,
                        error = %e,
                        "gadget removal failed after helper death"
                    );
                    let error =
                        SlotError::new(ErrorKind::DeviceOrResourceBusy, "unable to unmount gadget");
                    (self.enter_ready(inner, Some(error)), None)
                } else {
                    (self.enter_ready(inner, None), None)
                }
            }
            (State::WaitingForProcessEnd { .. }, Event::SubprocessStopped) => {
                (self.enter_ready(inner, None), None)
            }

            (
                State::WaitingForGadget { process },
                Event::DeviceChanged {
                    change: DeviceChange::Inserted,
                },
            ) => {
                let rw = inner.target.as_ref().map(|t| t.rw).unwrap_or(false);
                match self
                    .platform
                    .gadget()
                    .configure(&self.name, &self.config.nbd_device, rw)
                {
                    Ok(()) => {
                        self.events.publish(AppEvent::ResourceCreated {
                            object_path: self.object_path(),
                        });
                        (State::Active { process }, None)
                    }
                    Err(e) => {
                        tracing::error!(slot = %self.name, error = %e, "gadget configuration failed");
                        self.stop_process(&process);
                        let error = SlotError::new(
                            ErrorKind::DeviceOrResourceBusy,
                            "unable to configure gadget",
                        );
                        (self.enter_ready(inner, Some(error)), None)
                    }
                }
            }
            (
                State::WaitingForGadget { process },
                Event::DeviceChanged {
                    change: DeviceChange::Removed,
                },
            ) => {
                self.stop_process(&process);
                let error =
                    SlotError::new(ErrorKind::OperationNotSupported, "unexpected device event");
                (self.enter_ready(inner, Some(error)), None)
            }
            (state @ State::Ready { .. }, Event::DeviceChanged { change }) => {
                if change == DeviceChange::Removed {
                    // The kernel notification often trails the teardown that
                    // already killed the helper.
                    tracing::debug!(slot = %self.name, "late device removal in ready");
                }
                (state, None)
            }
            (state, Event::DeviceChanged { change }) => {
                tracing::error!(
                    slot = %self.name,
                    state = state.name(),
                    ?change,
                    "device event inconsistent with state; review transitions"
                );
                (state, None)
            }

            (state, event) => {
                tracing::error!(
                    slot = %self.name,
                    state = state.name(),
                    event = event.name(),
                    "unexpected event; review transitions"
                );
                (state, None)
            }
        };
        inner.state = next;
        Ok(follow)
    }

    /// Entry action for Ready: tear down whatever the previous target left
    /// behind and drop it.
    fn enter_ready(&self, inner: &mut Inner, error: Option<SlotError>) -> State {
        if let Some(e) = &error {
            tracing::error!(
                slot = %self.name,
                errno = e.kind.errno(),
                message = %e.message,
                "slot settled in ready with error"
            );
        }
        self.cleanup_target(inner);
        State::Ready { error }
    }

    /// Drop the target, unmounting and removing its share directory first.
    fn cleanup_target(&self, inner: &mut Inner) {
        if let Some(target) = inner.target.take() {
            if let Some(dir) = &target.mount_dir {
                if let Err(e) = self.platform.share().unmount(dir) {
                    tracing::warn!(
                        slot = %self.name,
                        dir = %dir.display(),
                        error = %e,
                        "mount directory cleanup failed"
                    );
                }
            }
        }
    }

    fn stop_process(&self, process: &Weak<dyn ProcessHandle>) {
        match process.upgrade() {
            Some(handle) => handle.stop(),
            None => tracing::debug!(slot = %self.name, "no process to stop"),
        }
    }

    // ---- Activation pipeline --------------------------------------------

    fn activate(self: &Arc<Self>, inner: &mut Inner) -> State {
        let result = match self.config.mode {
            Mode::Proxy => self.activate_proxy(),
            Mode::Legacy => self.activate_legacy(inner),
        };
        // The mount helpers have consumed the credentials by now; drop the
        // handle on success and on every error path alike.
        if let Some(target) = inner.target.as_mut() {
            target.credentials = None;
        }
        match result {
            Ok(process) => State::WaitingForGadget { process },
            Err(error) => self.enter_ready(inner, Some(error)),
        }
    }

    /// Proxy mode: the NBD server is external, bind the client directly.
    fn activate_proxy(self: &Arc<Self>) -> Result<Weak<dyn ProcessHandle>, SlotError> {
        let args = self.config.nbd_client_args();
        let handle = self
            .platform
            .process()
            .spawn(&self.name, NBD_CLIENT, &args, self.exit_handler(None))
            .map_err(|e| {
                tracing::error!(slot = %self.name, error = %e, "nbd-client spawn failed");
                SlotError::new(ErrorKind::OperationCanceled, "failed to spawn process")
            })?;
        Ok(Arc::downgrade(&handle))
    }

    /// Legacy mode: the URL scheme picks the nbdkit back-end.
    fn activate_legacy(self: &Arc<Self>, inner: &mut Inner) -> Result<Weak<dyn ProcessHandle>, SlotError> {
        let Some(target) = inner.target.as_ref() else {
            return Err(SlotError::new(ErrorKind::OperationCanceled, "no mount target"));
        };
        let url = target.img_url.clone();
        let rw = target.rw;
        tracing::debug!(slot = %self.name, url = %url, rw, "mount requested");

        if let Some(rest) = url.strip_prefix("smb://") {
            self.mount_smb_share(inner, rest, rw)
        } else if url.starts_with("https://") {
            self.mount_https_share(inner, &url, rw)
        } else {
            Err(SlotError::new(ErrorKind::InvalidArgument, "URL not recognized"))
        }
    }

    /// CIFS: mount the share containing the image, then serve the file from
    /// inside the mount with nbdkit's file plugin. Failures roll back in
    /// reverse order.
    fn mount_smb_share(
        self: &Arc<Self>,
        inner: &mut Inner,
        location: &str,
        rw: bool,
    ) -> Result<Weak<dyn ProcessHandle>, SlotError> {
        let (parent, file_name) = split_share_location(location)
            .ok_or_else(|| SlotError::new(ErrorKind::InvalidArgument, "URL not recognized"))?;
        let remote_parent = format!("//{parent}");

        let dir = self
            .platform
            .share()
            .create_mount_dir(&self.name)
            .map_err(|e| {
                tracing::error!(slot = %self.name, error = %e, "mount directory creation failed");
                SlotError::new(ErrorKind::IoError, "failed to create mount directory")
            })?;

        let credentials = inner.target.as_ref().and_then(|t| t.credentials.as_ref());
        if let Err(e) = self
            .platform
            .share()
            .mount(&remote_parent, &dir, rw, credentials)
        {
            tracing::error!(slot = %self.name, remote = %remote_parent, error = %e, "CIFS mount failed");
            let _ = self.platform.share().unmount(&dir);
            return Err(SlotError::new(
                ErrorKind::InvalidArgument,
                "failed to mount CIFS share",
            ));
        }

        let local_file = dir.join(file_name);
        let process = match self.spawn_nbdkit(
            rw,
            None,
            vec!["file".to_string(), format!("file={}", local_file.display())],
        ) {
            Ok(process) => process,
            Err(e) => {
                let _ = self.platform.share().unmount(&dir);
                return Err(e);
            }
        };

        if let Some(target) = inner.target.as_mut() {
            target.mount_dir = Some(dir);
        }
        Ok(process)
    }

    /// HTTPS: nbdkit's curl plugin streams the image directly. A password
    /// never reaches argv; it is materialized in a volatile file the exit
    /// callback keeps alive for the whole child lifetime.
    fn mount_https_share(
        self: &Arc<Self>,
        inner: &mut Inner,
        url: &str,
        rw: bool,
    ) -> Result<Weak<dyn ProcessHandle>, SlotError> {
        let mut params = vec![
            "curl".to_string(),
            "sslverify=false".to_string(),
            format!("url={url}"),
        ];
        let mut secret = None;
        if let Some(credentials) = inner.target.as_ref().and_then(|t| t.credentials.as_ref()) {
            let file = VolatileFile::new(credentials.pack_password()).map_err(|e| {
                tracing::error!(slot = %self.name, error = %e, "secret file creation failed");
                SlotError::new(ErrorKind::OperationCanceled, "failed to materialize secret")
            })?;
            params.push(format!("user={}", credentials.user()));
            params.push(format!("password=+{}", file.path().display()));
            secret = Some(file);
        }
        self.spawn_nbdkit(rw, secret, params)
    }

    /// Common nbdkit launch: listen on the slot's socket, run nbd-client
    /// against the slot's device, then the plugin parameters.
    fn spawn_nbdkit(
        self: &Arc<Self>,
        rw: bool,
        secret: Option<VolatileFile>,
        params: Vec<String>,
    ) -> Result<Weak<dyn ProcessHandle>, SlotError> {
        self.platform
            .share()
            .remove_stale_socket(&self.config.unix_socket)
            .map_err(|e| {
                tracing::error!(
                    slot = %self.name,
                    socket = %self.config.unix_socket.display(),
                    error = %e,
                    "unable to remove pre-existing socket"
                );
                SlotError::new(ErrorKind::OperationCanceled, "unable to remove pre-existing socket")
            })?;

        let nbd_client = std::iter::once(NBD_CLIENT.to_string())
            .chain(self.config.nbd_client_args())
            .collect::<Vec<_>>()
            .join(" ");

        let mut args = vec![
            "--unix".to_string(),
            self.config.unix_socket.display().to_string(),
            "--run".to_string(),
            nbd_client,
        ];
        if self.config.verbose_nbdkit_logs {
            args.push("--verbose".to_string());
        }
        if !rw {
            args.push("--readonly".to_string());
        }
        args.extend(params);

        let handle = self
            .platform
            .process()
            .spawn(&self.name, NBDKIT, &args, self.exit_handler(secret))
            .map_err(|e| {
                tracing::error!(slot = %self.name, error = %e, "nbdkit spawn failed");
                SlotError::new(ErrorKind::OperationCanceled, "failed to spawn process")
            })?;
        Ok(Arc::downgrade(&handle))
    }

    /// Exit callback for a helper process. Holds the slot weakly, so a slot
    /// torn down before its helper exits turns the callback into a no-op;
    /// owns the secret file, so it outlives the child that reads it.
    fn exit_handler(self: &Arc<Self>, secret: Option<VolatileFile>) -> ExitHandler {
        let weak = Arc::downgrade(self);
        Box::new(move |exit_code, requested| {
            let _secret = secret;
            let Some(slot) = weak.upgrade() else {
                return;
            };
            tracing::info!(
                slot = %slot.name,
                exit_code,
                requested,
                "helper process ended"
            );
            slot.subprocess_stopped(exit_code);
        })
    }

    // ---- Cooperative bus-facing operations ------------------------------

    /// Mount `target` and wait for the slot to settle.
    ///
    /// True once Active, false when the slot returned to Ready without a
    /// bound error (or the wait expired), the bound error otherwise.
    pub async fn mount(self: &Arc<Self>, target: Target) -> Result<bool, ServiceError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.emit(Event::Mount { target }))
            .await
            .map_err(|e| ServiceError::Internal(format!("dispatch task failed: {e}")))??;

        for _ in 0..WAIT_ROUNDS {
            let status = self.status();
            match status.state {
                StateKind::Active => return Ok(true),
                StateKind::Ready => {
                    return match status.error {
                        Some(error) => Err(ServiceError::Activation(error)),
                        None => Ok(false),
                    };
                }
                _ => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
        tracing::warn!(slot = %self.name, "mount wait expired before slot settled");
        Ok(false)
    }

    /// Unmount and wait for the slot to come back to Ready.
    pub async fn unmount(self: &Arc<Self>) -> Result<bool, ServiceError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.emit(Event::Unmount))
            .await
            .map_err(|e| ServiceError::Internal(format!("dispatch task failed: {e}")))??;

        for _ in 0..WAIT_ROUNDS {
            if self.status().state == StateKind::Ready {
                return Ok(true);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        tracing::warn!(slot = %self.name, "unmount wait expired before slot settled");
        Ok(true)
    }

    /// Publish the slot's interfaces and close the Initial state.
    pub async fn register(self: &Arc<Self>, connection: &zbus::Connection) -> zbus::Result<()> {
        use crate::interfaces::{LegacyService, MountPointIface, ProcessIface, ProxyService};

        let path = self.object_path();
        let server = connection.object_server();
        server
            .at(path.as_str(), MountPointIface::new(self.clone()))
            .await?;
        server
            .at(path.as_str(), ProcessIface::new(self.clone()))
            .await?;
        match self.config.mode {
            Mode::Proxy => {
                server
                    .at(path.as_str(), ProxyService::new(self.clone()))
                    .await?;
            }
            Mode::Legacy => {
                server
                    .at(path.as_str(), LegacyService::new(self.clone()))
                    .await?;
            }
        }
        tracing::info!(slot = %self.name, path = %path, "slot published on bus");

        let this = self.clone();
        tokio::task::spawn_blocking(move || this.emit(Event::RegisterBus))
            .await
            .map_err(|e| zbus::Error::Failure(format!("dispatch task failed: {e}")))?
            .map_err(|e| zbus::Error::Failure(e.to_string()))?;
        Ok(())
    }
}

/// Split `host/share/dir/image.iso` into the share path to mount and the
/// file inside it.
fn split_share_location(location: &str) -> Option<(&str, &str)> {
    let (parent, file_name) = location.rsplit_once('/')?;
    if parent.is_empty() || file_name.is_empty() || !parent.contains('/') {
        // A CIFS mount needs at least //host/share.
        return None;
    }
    Some((parent, file_name))
}
