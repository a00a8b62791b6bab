// SPDX-License-Identifier: GPL-3.0-only

//! Test doubles for the system adapters plus slot construction helpers.
//!
//! Every mock appends to a shared operation log so scenarios can assert
//! teardown ordering across adapter boundaries.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use vmedia_service::{EventBus, MountPoint, Platform};
use vmedia_sys::{
    Credentials, ExitHandler, GadgetOps, ProcessHandle, ProcessOps, ShareOps, SysError,
};
use vmedia_types::{Mode, MountConfig, NbdDevice};

pub type OpLog = Arc<Mutex<Vec<String>>>;

fn record(ops: &OpLog, entry: impl Into<String>) {
    ops.lock().unwrap().push(entry.into());
}

pub struct MockProcess {
    pub binary: String,
    pub args: Vec<String>,
    pub stopped: AtomicBool,
    ops: OpLog,
}

impl ProcessHandle for MockProcess {
    fn pid(&self) -> i32 {
        4242
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            record(&self.ops, "process.stop");
        }
    }
}

pub struct MockSupervisor {
    pub fail_spawn: AtomicBool,
    pub spawned: Mutex<Vec<Arc<MockProcess>>>,
    pending: Mutex<Vec<(Arc<MockProcess>, ExitHandler)>>,
    ops: OpLog,
}

impl MockSupervisor {
    fn new(ops: OpLog) -> Self {
        Self {
            fail_spawn: AtomicBool::new(false),
            spawned: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            ops,
        }
    }

    /// Processes that are running and have not been asked to stop.
    pub fn live_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .filter(|(process, _)| !process.stopped.load(Ordering::SeqCst))
            .count()
    }

    /// Processes that have not yet delivered their exit.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn last_spawn(&self) -> Option<Arc<MockProcess>> {
        self.spawned.lock().unwrap().last().cloned()
    }

    /// Deliver the exit of the oldest still-running process; returns false
    /// when none is pending.
    pub fn finish_next(&self, exit_code: i32) -> bool {
        let entry = {
            let mut pending = self.pending.lock().unwrap();
            if pending.is_empty() {
                return false;
            }
            pending.remove(0)
        };
        let (process, on_exit) = entry;
        let requested = process.stopped.load(Ordering::SeqCst);
        on_exit(exit_code, requested);
        true
    }
}

impl ProcessOps for MockSupervisor {
    fn spawn(
        &self,
        _slot: &str,
        binary: &str,
        args: &[String],
        on_exit: ExitHandler,
    ) -> Result<Arc<dyn ProcessHandle>, SysError> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(SysError::Spawn {
                binary: binary.to_string(),
                reason: "mock spawn failure".to_string(),
            });
        }
        let process = Arc::new(MockProcess {
            binary: binary.to_string(),
            args: args.to_vec(),
            stopped: AtomicBool::new(false),
            ops: self.ops.clone(),
        });
        record(&self.ops, format!("process.spawn:{binary}"));
        self.spawned.lock().unwrap().push(process.clone());
        self.pending.lock().unwrap().push((process.clone(), on_exit));
        Ok(process)
    }
}

pub struct MockGadget {
    pub fail_configure: AtomicBool,
    pub fail_remove: AtomicBool,
    pub configured: AtomicBool,
    pub configure_calls: Mutex<Vec<(String, NbdDevice, bool)>>,
    ops: OpLog,
}

impl MockGadget {
    fn new(ops: OpLog) -> Self {
        Self {
            fail_configure: AtomicBool::new(false),
            fail_remove: AtomicBool::new(false),
            configured: AtomicBool::new(false),
            configure_calls: Mutex::new(Vec::new()),
            ops,
        }
    }
}

impl GadgetOps for MockGadget {
    fn configure(&self, slot: &str, device: &NbdDevice, rw: bool) -> Result<(), SysError> {
        self.configure_calls
            .lock()
            .unwrap()
            .push((slot.to_string(), *device, rw));
        if self.fail_configure.load(Ordering::SeqCst) {
            return Err(SysError::Gadget("mock configure failure".to_string()));
        }
        record(&self.ops, "gadget.configure");
        self.configured.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, _slot: &str) -> Result<(), SysError> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(SysError::Gadget("mock remove failure".to_string()));
        }
        record(&self.ops, "gadget.remove");
        self.configured.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn trigger_udev_change(&self, _device: &NbdDevice) {
        record(&self.ops, "gadget.uevent");
    }
}

pub struct MockShare {
    pub fail_create_dir: AtomicBool,
    pub fail_mount: AtomicBool,
    pub fail_socket_cleanup: AtomicBool,
    pub mounted: AtomicBool,
    /// (remote, dir, rw, user)
    pub mount_calls: Mutex<Vec<(String, PathBuf, bool, Option<String>)>>,
    pub unmount_calls: Mutex<Vec<PathBuf>>,
    root: PathBuf,
    ops: OpLog,
}

impl MockShare {
    fn new(ops: OpLog) -> Self {
        Self {
            fail_create_dir: AtomicBool::new(false),
            fail_mount: AtomicBool::new(false),
            fail_socket_cleanup: AtomicBool::new(false),
            mounted: AtomicBool::new(false),
            mount_calls: Mutex::new(Vec::new()),
            unmount_calls: Mutex::new(Vec::new()),
            root: PathBuf::from("/tmp/mock-mounts"),
            ops,
        }
    }

    pub fn mount_dir_for(&self, slot: &str) -> PathBuf {
        self.root.join(slot)
    }
}

impl ShareOps for MockShare {
    fn create_mount_dir(&self, slot: &str) -> Result<PathBuf, SysError> {
        if self.fail_create_dir.load(Ordering::SeqCst) {
            return Err(SysError::Mount("mock mkdir failure".to_string()));
        }
        record(&self.ops, "share.mkdir");
        Ok(self.mount_dir_for(slot))
    }

    fn mount(
        &self,
        remote: &str,
        dir: &Path,
        rw: bool,
        credentials: Option<&Credentials>,
    ) -> Result<(), SysError> {
        if self.fail_mount.load(Ordering::SeqCst) {
            return Err(SysError::Mount("mock mount failure".to_string()));
        }
        self.mount_calls.lock().unwrap().push((
            remote.to_string(),
            dir.to_path_buf(),
            rw,
            credentials.map(|c| c.user().to_string()),
        ));
        record(&self.ops, "share.mount");
        self.mounted.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unmount(&self, dir: &Path) -> Result<(), SysError> {
        self.unmount_calls.lock().unwrap().push(dir.to_path_buf());
        record(&self.ops, "share.unmount");
        self.mounted.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn remove_stale_socket(&self, _socket: &Path) -> Result<(), SysError> {
        if self.fail_socket_cleanup.load(Ordering::SeqCst) {
            return Err(SysError::Mount("mock socket cleanup failure".to_string()));
        }
        Ok(())
    }
}

/// Mock adapters plus the [`Platform`] bundling them.
pub struct TestPlatform {
    pub supervisor: Arc<MockSupervisor>,
    pub gadget: Arc<MockGadget>,
    pub share: Arc<MockShare>,
    pub ops: OpLog,
    pub platform: Platform,
}

impl TestPlatform {
    pub fn new() -> Self {
        let ops: OpLog = Arc::new(Mutex::new(Vec::new()));
        let supervisor = Arc::new(MockSupervisor::new(ops.clone()));
        let gadget = Arc::new(MockGadget::new(ops.clone()));
        let share = Arc::new(MockShare::new(ops.clone()));
        let platform = Platform::new(supervisor.clone(), gadget.clone(), share.clone());
        Self {
            supervisor,
            gadget,
            share,
            ops,
            platform,
        }
    }

    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }
}

pub fn config(mode: Mode) -> MountConfig {
    MountConfig {
        mode,
        nbd_device: NbdDevice::new(0),
        unix_socket: PathBuf::from("/run/vm/nbd0.sock"),
        end_point_id: 1,
        timeout: None,
        blocksize: None,
        verbose_nbdkit_logs: false,
    }
}

pub fn slot(mode: Mode) -> (Arc<MountPoint>, TestPlatform, EventBus) {
    let platform = TestPlatform::new();
    let events = EventBus::new();
    let slot = Arc::new(MountPoint::new(
        "0".to_string(),
        config(mode),
        platform.platform.clone(),
        events.clone(),
    ));
    (slot, platform, events)
}

/// Poll `predicate` until it holds or two seconds have passed.
pub async fn wait_until(predicate: impl Fn() -> bool) {
    for _ in 0..400 {
        if predicate() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition not reached within two seconds");
}
