// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::error::{Result, SupervisorError};
use crate::launcher::{Worker, WorkerCommand, WorkerConfig, spawn_worker};
use crate::safety_net::{self, Registration};
use crate::shutdown::{DEFAULT_STOP_TIMEOUT, send_sigterm, terminate_worker};
use crate::state::SupervisorState;
use crate::streams::{StdoutEnd, classify_stdout, drain_stderr};
use log::{debug, error, info, warn};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Invoked once per `Published: ` line with the message identifier.
pub type PublishedCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Grace period between SIGTERM and SIGKILL.
    pub stop_timeout: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

/// Runs one publisher worker process and turns its stdout into events.
///
/// ```text
///  start() ──► spawn worker ──┬──► stdout task: classify lines ──► on_published
///                             │        │ (cancel / EOF / read error)
///                             │        ▼
///                             │    terminate + reap worker, close pipes ──► Stopped
///                             └──► stderr task: warn! per line
/// ```
///
/// `start` must be called from within a tokio runtime. Dropping the
/// supervisor requests the same shutdown as [`PublisherSupervisor::stop`].
pub struct PublisherSupervisor {
    inner: Arc<Inner>,
}

struct Inner {
    config: WorkerConfig,
    command: WorkerCommand,
    options: SupervisorOptions,
    state: watch::Sender<SupervisorState>,
    on_published: RwLock<Option<PublishedCallback>>,
    cancel: CancellationToken,
    started: AtomicBool,
    stop_requested: AtomicBool,
    /// Set by whichever side sends SIGTERM first. The stdout task claims it
    /// before reaping, so `stop` never signals a reaped (recyclable) PID.
    sigterm_claimed: Mutex<bool>,
    /// 0 until spawned and again once reaped.
    pid: AtomicU32,
}

impl PublisherSupervisor {
    pub fn new(config: WorkerConfig, command: WorkerCommand) -> Self {
        Self::with_options(config, command, SupervisorOptions::default())
    }

    pub fn with_options(
        config: WorkerConfig,
        command: WorkerCommand,
        options: SupervisorOptions,
    ) -> Self {
        let (state, _) = watch::channel(SupervisorState::Created);
        Self {
            inner: Arc::new(Inner {
                config,
                command,
                options,
                state,
                on_published: RwLock::new(None),
                cancel: CancellationToken::new(),
                started: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
                sigterm_claimed: Mutex::new(false),
                pid: AtomicU32::new(0),
            }),
        }
    }

    pub fn publisher_id(&self) -> &str {
        self.inner.config.publisher_id()
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SupervisorState {
        *self.inner.state.borrow()
    }

    /// PID of the live worker, if any.
    pub fn pid(&self) -> Option<u32> {
        match self.inner.pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    /// True once the stdout task has exited and the worker is gone.
    ///
    /// False before `start`, and stays false after a failed `try_start`
    /// since no task ever ran. Check [`PublisherSupervisor::state`] or the
    /// `try_start` result rather than polling this alone.
    pub fn is_ready(&self) -> bool {
        self.state() == SupervisorState::Stopped
    }

    /// Replace the published-event callback.
    ///
    /// Lines read before the new callback is visible go to the previous one
    /// (or nowhere), so register before `start`.
    pub fn set_on_published<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let mut slot = self
            .inner
            .on_published
            .write()
            .unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(callback));
    }

    /// Spawn the worker and begin reading its output. Returns immediately.
    ///
    /// A worker that cannot be launched leaves nothing to supervise: the
    /// error is logged and the host process exits with status 1. Use
    /// [`PublisherSupervisor::try_start`] to handle the failure instead.
    pub fn start(&self) {
        if let Err(e) = self.try_start() {
            error!("{e}");
            std::process::exit(1);
        }
    }

    /// Like [`PublisherSupervisor::start`], but returns launch errors.
    ///
    /// Calling it again after a successful start is a no-op.
    pub fn try_start(&self) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| SupervisorError::NoRuntime)?;
        let id = self.publisher_id();

        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!("[{id}] already started");
            return Ok(());
        }

        let worker = match spawn_worker(&self.inner.command, &self.inner.config) {
            Ok(worker) => worker,
            Err(e) => {
                self.inner.started.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let registration = safety_net::register(worker.pid);
        self.inner.pid.store(worker.pid, Ordering::SeqCst);
        self.inner.transition(SupervisorState::Running);

        runtime.spawn(supervise(Arc::clone(&self.inner), worker, registration));
        Ok(())
    }

    /// Stop reading and terminate the worker. Never blocks; safe to call
    /// before `start`, after the worker exited, and more than once.
    pub fn stop(&self) {
        let id = self.publisher_id();
        if self.inner.stop_requested.swap(true, Ordering::SeqCst) {
            debug!("[{id}] stop already requested");
            return;
        }

        info!("[{id}] stopping");
        self.inner.cancel.cancel();

        // Without signals the stdout task kills the child handle itself.
        if cfg!(unix) {
            let mut claimed = self.inner.claim_sigterm();
            if let Some(pid) = self.pid().filter(|_| !*claimed) {
                send_sigterm(id, pid);
                *claimed = true;
            }
        }
    }

    /// Resolve once the supervisor reaches [`SupervisorState::Stopped`].
    pub async fn wait_stopped(&self) {
        let mut rx = self.inner.state.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = rx.wait_for(|s| *s == SupervisorState::Stopped).await;
    }
}

impl Drop for PublisherSupervisor {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

impl fmt::Debug for PublisherSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherSupervisor")
            .field("config", &self.inner.config)
            .field("command", &self.inner.command)
            .field("state", &self.state())
            .field("pid", &self.pid())
            .finish()
    }
}

impl Inner {
    fn transition(&self, next: SupervisorState) {
        let id = self.config.publisher_id();
        self.state.send_if_modified(|current| {
            if current.can_transition_to(next) {
                debug!("[{id}] {current} -> {next}");
                *current = next;
                true
            } else {
                warn!("[{id}] ignoring invalid transition {current} -> {next}");
                false
            }
        });
    }

    fn claim_sigterm(&self) -> std::sync::MutexGuard<'_, bool> {
        self.sigterm_claimed.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, payload: &str) {
        let callback = self
            .on_published
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(callback) = callback else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
            error!(
                "[{}] published callback panicked on '{payload}'",
                self.config.publisher_id()
            );
        }
    }
}

/// Body of the stdout task. Owns the worker for its whole life.
async fn supervise(inner: Arc<Inner>, worker: Worker, registration: Registration) {
    let Worker {
        pid,
        mut child,
        stdout,
        stderr,
    } = worker;
    let id = inner.config.publisher_id();

    let stderr_done = CancellationToken::new();
    let drain = tokio::spawn(drain_stderr(id.to_string(), stderr, stderr_done.clone()));

    let mut stdout = BufReader::new(stdout);
    let end = classify_stdout(id, &mut stdout, &inner.cancel, |payload| inner.publish(payload)).await;
    match end {
        StdoutEnd::Cancelled => info!("[{id}] stop requested, terminating worker (pid={pid})"),
        StdoutEnd::EndOfStream => debug!("[{id}] worker closed stdout"),
        StdoutEnd::ReadError => info!("[{id}] stdout unreadable, terminating worker (pid={pid})"),
    }

    let signalled = std::mem::replace(&mut *inner.claim_sigterm(), true);
    terminate_worker(id, &mut child, inner.options.stop_timeout, signalled).await;
    inner.pid.store(0, Ordering::SeqCst);
    drop(registration);

    drop(stdout);
    stderr_done.cancel();
    if let Err(e) = drain.await {
        warn!("[{id}] stderr drain task failed: {e}");
    }

    inner.transition(SupervisorState::Stopped);
    info!("[{id}] supervisor stopped");
}
