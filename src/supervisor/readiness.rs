//! Readiness scanner: a pure stream scanner with no shared
//! mutable state. Reads lines from a child's stdout/stderr, emits a
//! `ReadinessEvent::Ready` on regex match, and an `Eof` event once the
//! reader is exhausted.

use regex::Regex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::Sender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessEvent {
    Ready(String),
    Eof,
}

/// Scans `reader` line by line, sending a `Ready` event for every line
/// matching `pattern`. Sends exactly one `Eof` event when the reader
/// returns EOF, then returns. A closed receiver ends the scan early.
pub async fn scan(mut reader: impl AsyncBufRead + Unpin, pattern: &Regex, tx: Sender<ReadinessEvent>) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                let _ = tx.send(ReadinessEvent::Eof).await;
                return;
            }
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\n', '\r']);
                if pattern.is_match(trimmed) {
                    if tx.send(ReadinessEvent::Ready(trimmed.to_string())).await.is_err() {
                        return;
                    }
                }
            }
            Err(_) => {
                let _ = tx.send(ReadinessEvent::Eof).await;
                return;
            }
        }
    }
}
