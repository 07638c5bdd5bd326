// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

//! In-memory `log` backend for unit tests. Tests run in parallel, so each one
//! filters the shared record list by its own publisher id tag.

use log::{Level, LevelFilter, Log, Metadata, Record};
use std::sync::{Mutex, Once};

#[derive(Debug, Clone)]
pub(crate) struct CapturedRecord {
    pub level: Level,
    pub message: String,
}

struct CaptureLogger;

static RECORDS: Mutex<Vec<CapturedRecord>> = Mutex::new(Vec::new());
static INIT: Once = Once::new();
static LOGGER: CaptureLogger = CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let captured = CapturedRecord {
            level: record.level(),
            message: record.args().to_string(),
        };
        RECORDS
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(captured);
    }

    fn flush(&self) {}
}

pub(crate) fn init() {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).expect("no other logger installed in unit tests");
        log::set_max_level(LevelFilter::Trace);
    });
}

/// Records tagged `[publisher_id] ...`, in emission order.
pub(crate) fn records_for(publisher_id: &str) -> Vec<CapturedRecord> {
    let tag = format!("[{publisher_id}] ");
    RECORDS
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .iter()
        .filter(|r| r.message.starts_with(&tag))
        .cloned()
        .collect()
}
