// SPDX-License-Identifier: GPL-3.0-only

//! Child-process supervision for the NBD helper binaries
//!
//! The supervisor keeps the strong reference to every process it spawns: the
//! exit-waiter task owns the handle until the child is gone and then invokes
//! the exit callback exactly once. Callers only ever hold [`std::sync::Weak`]
//! references, so a slot being torn down mid-flight cannot leave a dangling
//! callback target.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Command;

use crate::error::{Result, SysError};

/// Grace period between SIGTERM and SIGKILL when stopping a child.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Invoked exactly once when the child exits.
///
/// Arguments are the exit code (`128 + signal` for signal deaths, `-1` when
/// the status could not be collected) and whether termination had been
/// requested through [`ProcessHandle::stop`] beforehand.
pub type ExitHandler = Box<dyn FnOnce(i32, bool) + Send + 'static>;

/// Handle to a supervised child process.
pub trait ProcessHandle: Send + Sync {
    fn pid(&self) -> i32;

    /// Request termination: SIGTERM now, SIGKILL after a bounded grace
    /// period. Idempotent.
    fn stop(&self);
}

/// Spawning of supervised helper processes.
pub trait ProcessOps: Send + Sync {
    /// Launch `binary` with `args` on behalf of slot `slot`.
    ///
    /// `on_exit` fires asynchronously from the supervisor once the child is
    /// gone; the returned handle may already have been dropped by then.
    fn spawn(
        &self,
        slot: &str,
        binary: &str,
        args: &[String],
        on_exit: ExitHandler,
    ) -> Result<Arc<dyn ProcessHandle>>;
}

struct Process {
    slot: String,
    pid: Pid,
    stop_requested: AtomicBool,
    exited: Arc<AtomicBool>,
}

impl ProcessHandle for Process {
    fn pid(&self) -> i32 {
        self.pid.as_raw()
    }

    fn stop(&self) {
        if self.stop_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(slot = %self.slot, pid = self.pid.as_raw(), "stopping helper process");
        if let Err(e) = kill(self.pid, Signal::SIGTERM) {
            tracing::warn!(slot = %self.slot, pid = self.pid.as_raw(), error = %e, "SIGTERM failed");
            return;
        }
        let pid = self.pid;
        let slot = self.slot.clone();
        let exited = self.exited.clone();
        tokio::spawn(async move {
            tokio::time::sleep(STOP_GRACE).await;
            if !exited.load(Ordering::SeqCst) {
                tracing::warn!(slot = %slot, pid = pid.as_raw(), "grace period expired, sending SIGKILL");
                let _ = kill(pid, Signal::SIGKILL);
            }
        });
    }
}

/// Real supervisor backed by `tokio::process`.
#[derive(Default)]
pub struct Supervisor;

impl Supervisor {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessOps for Supervisor {
    fn spawn(
        &self,
        slot: &str,
        binary: &str,
        args: &[String],
        on_exit: ExitHandler,
    ) -> Result<Arc<dyn ProcessHandle>> {
        let mut child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SysError::Spawn {
                binary: binary.to_string(),
                reason: e.to_string(),
            })?;

        let pid = child.id().ok_or_else(|| SysError::Spawn {
            binary: binary.to_string(),
            reason: "child exited before pid capture".to_string(),
        })?;

        let handle = Arc::new(Process {
            slot: slot.to_string(),
            pid: Pid::from_raw(pid as i32),
            stop_requested: AtomicBool::new(false),
            exited: Arc::new(AtomicBool::new(false)),
        });
        tracing::info!(slot = %slot, binary = %binary, pid, "spawned helper process");

        // The waiter owns the strong reference for the child's lifetime.
        let strong = handle.clone();
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => exit_code(status),
                Err(e) => {
                    tracing::error!(slot = %strong.slot, error = %e, "waiting for child failed");
                    -1
                }
            };
            strong.exited.store(true, Ordering::SeqCst);
            let requested = strong.stop_requested.load(Ordering::SeqCst);
            tracing::debug!(slot = %strong.slot, pid = strong.pid.as_raw(), code, requested, "helper process ended");
            // Run the callback off the async workers; it may block on
            // filesystem teardown.
            let _ = tokio::task::spawn_blocking(move || on_exit(code, requested));
        });

        Ok(handle)
    }
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}
