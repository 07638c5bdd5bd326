// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Process-wide exit hook that terminates every worker still registered when
//! the host calls `exit`. Kill-on-drop does not help there: `exit` runs no
//! destructors.

use log::warn;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, Once};

static LIVE_WORKERS: Mutex<Option<HashMap<u64, u32>>> = Mutex::new(None);
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);
static INSTALL: Once = Once::new();

/// Keeps a worker PID registered with the exit hook until dropped.
#[derive(Debug)]
pub(crate) struct Registration {
    token: u64,
}

pub(crate) fn register(pid: u32) -> Registration {
    INSTALL.call_once(|| {
        // SAFETY: the hook is a plain `extern "C" fn` that never unwinds.
        if unsafe { libc::atexit(terminate_live_workers) } != 0 {
            warn!("failed to install worker exit hook, orphans possible on exit");
        }
    });

    let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    live_workers().get_or_insert_with(HashMap::new).insert(token, pid);
    Registration { token }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(workers) = live_workers().as_mut() {
            workers.remove(&self.token);
        }
    }
}

fn live_workers() -> std::sync::MutexGuard<'static, Option<HashMap<u64, u32>>> {
    LIVE_WORKERS.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
pub(crate) fn registered_pids() -> Vec<u32> {
    live_workers()
        .as_ref()
        .map(|w| w.values().copied().collect())
        .unwrap_or_default()
}

extern "C" fn terminate_live_workers() {
    // try_lock: exit may be called while another thread holds the lock.
    let pids: Vec<u32> = match LIVE_WORKERS.try_lock() {
        Ok(guard) => guard.as_ref().map(|w| w.values().copied().collect()),
        Err(std::sync::TryLockError::Poisoned(e)) => {
            e.into_inner().as_ref().map(|w| w.values().copied().collect())
        }
        Err(std::sync::TryLockError::WouldBlock) => None,
    }
    .unwrap_or_default();

    for pid in pids {
        terminate(pid);
    }
}

#[cfg(unix)]
fn terminate(pid: u32) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
}

#[cfg(not(unix))]
fn terminate(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_drop() {
        let reg = register(4_000_001);
        assert!(registered_pids().contains(&4_000_001));
        drop(reg);
        assert!(!registered_pids().contains(&4_000_001));
    }

    #[test]
    fn test_same_pid_registered_twice_is_tracked_per_registration() {
        let first = register(4_000_002);
        let second = register(4_000_002);
        drop(first);
        assert!(registered_pids().contains(&4_000_002));
        drop(second);
        assert!(!registered_pids().contains(&4_000_002));
    }
}
