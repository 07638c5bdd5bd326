// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use log::{debug, info, warn};
use tokio::process::Child;
use tokio::time::{Duration, timeout};

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);
const SIGKILL_TIMEOUT: Duration = Duration::from_secs(10);

/// Ask a worker to exit by PID. Errors (already gone, reaped) are logged at debug.
#[cfg(unix)]
pub(crate) fn send_sigterm(publisher_id: &str, pid: u32) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        debug!("[{publisher_id}] SIGTERM to pid {pid} failed: {e}");
    }
}

#[cfg(not(unix))]
pub(crate) fn send_sigterm(publisher_id: &str, pid: u32) {
    // Without signals the stdout task kills the child handle directly.
    debug!("[{publisher_id}] no SIGTERM on this platform (pid {pid})");
}

/// Terminate the worker if it is still alive and reap it.
///
/// SIGTERM first (skipped when `signalled`), then SIGKILL once `stop_timeout` elapses.
pub(crate) async fn terminate_worker(
    publisher_id: &str,
    child: &mut Child,
    stop_timeout: Duration,
    signalled: bool,
) {
    match child.try_wait() {
        Ok(Some(status)) => {
            info!("[{publisher_id}] worker exited with {status}");
            return;
        }
        Ok(None) => {}
        Err(e) => warn!("[{publisher_id}] failed to poll worker status: {e}"),
    }

    match child.id() {
        Some(_) if signalled => debug!("[{publisher_id}] SIGTERM already sent, waiting"),
        Some(pid) if cfg!(unix) => {
            info!("[{publisher_id}] sending SIGTERM (pid={pid})");
            send_sigterm(publisher_id, pid);
        }
        _ => {
            if let Err(e) = child.start_kill() {
                warn!("[{publisher_id}] failed to kill worker: {e}");
            }
        }
    }

    match timeout(stop_timeout, child.wait()).await {
        Ok(Ok(status)) => {
            info!("[{publisher_id}] worker exited with {status}");
            return;
        }
        Ok(Err(e)) => warn!("[{publisher_id}] failed to wait on worker: {e}"),
        Err(_) => warn!(
            "[{publisher_id}] stop timeout ({}s) reached, sending SIGKILL",
            stop_timeout.as_secs()
        ),
    }

    if let Err(e) = child.start_kill() {
        debug!("[{publisher_id}] SIGKILL failed: {e}");
    }
    match timeout(SIGKILL_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => info!("[{publisher_id}] worker killed ({status})"),
        Ok(Err(e)) => warn!("[{publisher_id}] failed to reap worker: {e}"),
        Err(_) => warn!("[{publisher_id}] still running after SIGKILL, giving up"),
    }
}
