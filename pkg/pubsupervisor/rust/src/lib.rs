// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Supervision of external publisher worker processes.
//!
//! A [`PublisherSupervisor`] launches one worker with its configuration as a
//! single JSON argument, classifies the worker's stdout into published events
//! and log lines, forwards stderr as warnings, and guarantees the worker does
//! not outlive the supervisor or the host process.

pub mod classify;
pub mod config;
pub mod error;
pub mod launcher;
mod safety_net;
mod shutdown;
pub mod state;
mod streams;
pub mod supervisor;

#[cfg(test)]
mod test_log;

pub use classify::{WorkerLine, classify};
pub use error::{Result, SupervisorError};
pub use launcher::{GroupKey, WorkerCommand, WorkerConfig};
pub use shutdown::DEFAULT_STOP_TIMEOUT;
pub use state::SupervisorState;
pub use supervisor::{PublishedCallback, PublisherSupervisor, SupervisorOptions};
