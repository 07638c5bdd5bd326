// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! Classification of the lines a publisher worker prints on stdout.

use log::{Level, log};

pub const PUBLISHED_PREFIX: &str = "Published: ";
pub const GOING_TO_PUBLISH_PREFIX: &str = "Going to publish";
pub const ROTATING_PREFIX: &str = "Rotating";
pub const DONE_PREFIX: &str = "Done: ";

/// Byte offset of the message identifier in a `Published: ` line.
///
/// One past the prefix: the worker separates the prefix from the identifier
/// with an extra space.
pub const PUBLISHED_PAYLOAD_OFFSET: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Published,
    GoingToPublish,
    Rotating,
    Done,
    Other,
}

/// Evaluated top to bottom, first match wins.
const PREFIX_TABLE: [(&str, LineKind); 4] = [
    (PUBLISHED_PREFIX, LineKind::Published),
    (GOING_TO_PUBLISH_PREFIX, LineKind::GoingToPublish),
    (ROTATING_PREFIX, LineKind::Rotating),
    (DONE_PREFIX, LineKind::Done),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerLine<'a> {
    /// Carries the published message identifier.
    Published(&'a str),
    GoingToPublish,
    Rotating,
    Done,
    Other,
}

impl WorkerLine<'_> {
    /// Level the raw line is logged at. Published lines go to the callback instead.
    pub fn log_level(&self) -> Option<Level> {
        match self {
            WorkerLine::Published(_) => None,
            WorkerLine::Done => Some(Level::Info),
            WorkerLine::GoingToPublish | WorkerLine::Rotating | WorkerLine::Other => {
                Some(Level::Debug)
            }
        }
    }
}

pub fn classify(line: &str) -> WorkerLine<'_> {
    let kind = PREFIX_TABLE
        .iter()
        .find(|(prefix, _)| line.starts_with(prefix))
        .map_or(LineKind::Other, |&(_, kind)| kind);

    match kind {
        LineKind::Published => {
            WorkerLine::Published(line.get(PUBLISHED_PAYLOAD_OFFSET..).unwrap_or(""))
        }
        LineKind::GoingToPublish => WorkerLine::GoingToPublish,
        LineKind::Rotating => WorkerLine::Rotating,
        LineKind::Done => WorkerLine::Done,
        LineKind::Other => WorkerLine::Other,
    }
}

/// Classify one stdout line, then either hand the payload to `on_published`
/// or log the line tagged with the publisher id.
pub(crate) fn dispatch_line<F>(publisher_id: &str, line: &str, on_published: F)
where
    F: FnOnce(&str),
{
    let classified = classify(line);
    match (classified, classified.log_level()) {
        (WorkerLine::Published(payload), _) => on_published(payload),
        (_, Some(level)) => log!(level, "[{publisher_id}] {line}"),
        (_, None) => {}
    }
}
