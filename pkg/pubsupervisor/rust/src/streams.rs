// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use crate::classify::dispatch_line;
use log::{debug, error, warn};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::sync::CancellationToken;

/// Why the stdout loop stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StdoutEnd {
    Cancelled,
    EndOfStream,
    ReadError,
}

/// Read one line, without its `\n` / `\r\n`. Invalid UTF-8 is replaced, not fatal.
/// Returns `None` at end of stream.
pub(crate) async fn read_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(buf).into_owned()))
}

/// Classify stdout line by line until cancelled, end of stream, or a read error.
///
/// Cancellation is checked before every read and also wins over a read that
/// is still waiting for data. A line already being dispatched is finished first.
pub(crate) async fn classify_stdout<R, F>(
    publisher_id: &str,
    reader: &mut BufReader<R>,
    cancel: &CancellationToken,
    mut on_published: F,
) -> StdoutEnd
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut buf = Vec::new();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return StdoutEnd::Cancelled,
            line = read_line_lossy(reader, &mut buf) => match line {
                Ok(Some(line)) => dispatch_line(publisher_id, &line, &mut on_published),
                Ok(None) => return StdoutEnd::EndOfStream,
                Err(e) => {
                    warn!("[{publisher_id}] failed to read worker stdout: {e}");
                    return StdoutEnd::ReadError;
                }
            },
        }
    }
}

/// Forward every stderr line at warn level until end of stream or `done`.
///
/// Owns its reader; shares nothing with the stdout path.
pub(crate) async fn drain_stderr<R>(publisher_id: String, stderr: R, done: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    loop {
        tokio::select! {
            biased;
            line = read_line_lossy(&mut reader, &mut buf) => match line {
                Ok(Some(line)) => warn!("[{publisher_id}] {line}"),
                Ok(None) => break,
                Err(e) => {
                    error!("[{publisher_id}] failed to read worker stderr: {e}");
                    break;
                }
            },
            _ = done.cancelled() => {
                debug!("[{publisher_id}] worker reaped, closing stderr");
                break;
            }
        }
    }
}
