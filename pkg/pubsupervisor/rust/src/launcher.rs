// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::error::{Result, SupervisorError};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Stdio;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

pub const DEFAULT_WORKER_PROGRAM: &str = "node";
pub const DEFAULT_WORKER_ARGS: [&str; 2] = ["--enable-source-maps", "publisher.js"];

/// Symmetric key handed to the worker for encrypted publishing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupKey {
    pub group_key_id: String,
    pub group_key_hex: String,
}

impl GroupKey {
    pub fn new(group_key_id: impl Into<String>, group_key_hex: impl Into<String>) -> Self {
        Self {
            group_key_id: group_key_id.into(),
            group_key_hex: group_key_hex.into(),
        }
    }

    /// Compact JSON form embedded as a string in the worker payload.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// What a single worker publishes and as whom. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    publisher_id: String,
    private_key: String,
    stream_id: String,
    publish_function: String,
    interval_ms: u64,
    max_messages: u32,
    group_key: Option<GroupKey>,
}

impl WorkerConfig {
    pub fn new(
        publisher_id: impl Into<String>,
        private_key: impl Into<String>,
        stream_id: impl Into<String>,
        publish_function: impl Into<String>,
        interval_ms: u64,
        max_messages: u32,
    ) -> Self {
        Self {
            publisher_id: publisher_id.into(),
            private_key: private_key.into(),
            stream_id: stream_id.into(),
            publish_function: publish_function.into(),
            interval_ms,
            max_messages,
            group_key: None,
        }
    }

    pub fn with_group_key(mut self, group_key: GroupKey) -> Self {
        self.group_key = Some(group_key);
        self
    }

    pub fn publisher_id(&self) -> &str {
        &self.publisher_id
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn publish_function(&self) -> &str {
        &self.publish_function
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// 0 means publish until stopped.
    pub fn max_messages(&self) -> u32 {
        self.max_messages
    }

    pub fn group_key(&self) -> Option<&GroupKey> {
        self.group_key.as_ref()
    }

    /// Serialize into the single argument the worker expects.
    pub fn payload(&self) -> Result<String> {
        let group_key = match self.group_key {
            Some(ref key) => key.to_json()?,
            None => String::new(),
        };
        let payload = WorkerPayload {
            private_key: &self.private_key,
            stream_id: &self.stream_id,
            publish_function_name: &self.publish_function,
            interval: self.interval_ms,
            max_messages: self.max_messages,
            group_key,
        };
        Ok(serde_json::to_string(&payload)?)
    }
}

// The private key never ends up in logs.
impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("publisher_id", &self.publisher_id)
            .field("private_key", &"<redacted>")
            .field("stream_id", &self.stream_id)
            .field("publish_function", &self.publish_function)
            .field("interval_ms", &self.interval_ms)
            .field("max_messages", &self.max_messages)
            .field("group_key", &self.group_key.as_ref().map(|k| &k.group_key_id))
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WorkerPayload<'a> {
    private_key: &'a str,
    stream_id: &'a str,
    publish_function_name: &'a str,
    interval: u64,
    max_messages: u32,
    group_key: String,
}

/// Program and leading arguments; the payload is always appended last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for WorkerCommand {
    fn default() -> Self {
        Self::new(
            DEFAULT_WORKER_PROGRAM,
            DEFAULT_WORKER_ARGS.iter().map(|s| s.to_string()).collect(),
        )
    }
}

/// A freshly spawned worker with both output pipes detached from the child.
pub(crate) struct Worker {
    pub pid: u32,
    pub child: Child,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Spawn the worker. Must run inside a tokio runtime.
pub(crate) fn spawn_worker(command: &WorkerCommand, config: &WorkerConfig) -> Result<Worker> {
    let payload = config.payload()?;

    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .arg(payload)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|source| SupervisorError::Launch {
        publisher: config.publisher_id.clone(),
        command: command.describe(),
        source,
    })?;

    let pid = child.id().unwrap_or(0);
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| missing_pipe(config, "stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| missing_pipe(config, "stderr"))?;

    info!(
        "[{}] spawned (pid={}, cmd={})",
        config.publisher_id,
        pid,
        command.describe()
    );
    Ok(Worker {
        pid,
        child,
        stdout,
        stderr,
    })
}

fn missing_pipe(config: &WorkerConfig, stream: &'static str) -> SupervisorError {
    SupervisorError::MissingPipe {
        publisher: config.publisher_id.clone(),
        stream,
    }
}
