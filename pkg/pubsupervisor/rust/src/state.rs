// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupervisorState {
    /// Constructed, worker not spawned yet.
    #[default]
    Created,
    /// Worker spawned and its stdout is being read.
    Running,
    /// Reading loop exited and the worker has been terminated and reaped.
    Stopped,
}

impl SupervisorState {
    pub(crate) fn can_transition_to(self, next: SupervisorState) -> bool {
        use SupervisorState::*;
        matches!((self, next), (Created, Running) | (Running, Stopped))
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorState::Created => write!(f, "created"),
            SupervisorState::Running => write!(f, "running"),
            SupervisorState::Stopped => write!(f, "stopped"),
        }
    }
}
