// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("[{publisher}] failed to spawn worker '{command}': {source}")]
    Launch {
        publisher: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode worker payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("[{publisher}] worker spawned without a piped {stream}")]
    MissingPipe {
        publisher: String,
        stream: &'static str,
    },

    #[error("supervisor must be started from within a tokio runtime")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
