//! Line-delimited JSON channel over stdio (C1, SPEC_FULL.md §4.1).
//!
//! Grounded on the teacher's `ShutdownHandler`/broadcast-style signaling
//! idiom (`coldvox-foundation`), rebuilt around a dedicated writer task so
//! that a `response` line and `event` lines produced by concurrent tasks
//! (the monitor loop, a streaming pipeline call) are serialized onto
//! stdout without either task needing to hold a lock across an `.await`.

use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use sidecar_foundation::shutdown::ShutdownHandle;

use crate::messages::{Envelope, Outbound};

/// Messages longer than this are rejected with `INVALID_MESSAGE` rather
/// than parsed (§4.1 framing rules).
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// One line read from stdin, or a reason the read loop should stop.
pub enum InboundLine {
    Line(String),
    TooLarge,
    Eof,
    Idle,
}

/// A clonable handle for emitting outbound lines. Cloning is cheap (an
/// `mpsc::UnboundedSender`); every task that can produce an outbound
/// message — the dispatcher, the pipeline, the monitor callbacks — holds
/// one.
#[derive(Clone)]
pub struct OutputSink {
    tx: mpsc::UnboundedSender<String>,
}

impl OutputSink {
    /// Serializes `payload`, wraps it in an [`Envelope`], and queues it for
    /// the writer task. Serialization failures are a programmer error (the
    /// payload types are all `#[derive(Serialize)]` over plain data) and
    /// are logged rather than propagated — there is no reasonable recovery
    /// from an outbound message that cannot be serialized.
    pub fn send(&self, payload: impl Serialize) {
        let envelope = Envelope::new(payload);
        match serde_json::to_string(&envelope) {
            Ok(line) => {
                if self.tx.send(line).is_err() {
                    tracing::warn!(target: "sidecar::ipc", "output writer has shut down; dropping message");
                }
            }
            Err(e) => tracing::error!(target: "sidecar::ipc", error = %e, "failed to serialize outbound message"),
        }
    }
}

/// Builds a sink with no writer task behind it, handing the caller the raw
/// receiver instead. Production code always goes through [`spawn_writer`];
/// this exists for integration tests (outside this crate, so not
/// `cfg(test)`-gated) that need to assert on exact emitted JSON lines
/// without a real stdout in the loop.
pub fn unconnected_sink() -> (OutputSink, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    (OutputSink { tx }, rx)
}

/// Spawns the task that owns stdout and drains queued lines onto it one at
/// a time, each followed by `\n`. Returns a sink for producers and the
/// task's join handle so the caller can await a clean exit during
/// shutdown.
pub fn spawn_writer() -> (OutputSink, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let handle = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = rx.recv().await {
            if let Err(e) = stdout.write_all(line.as_bytes()).await {
                tracing::error!(target: "sidecar::ipc", error = %e, "write failure on stdout, stopping writer");
                break;
            }
            if let Err(e) = stdout.write_all(b"\n").await {
                tracing::error!(target: "sidecar::ipc", error = %e, "write failure on stdout, stopping writer");
                break;
            }
            if let Err(e) = stdout.flush().await {
                tracing::error!(target: "sidecar::ipc", error = %e, "flush failure on stdout, stopping writer");
                break;
            }
        }
    });
    (OutputSink { tx }, handle)
}

/// Reads one line from `reader`, bounded by `idle_timeout` (§4.1: "Reads on
/// the inbound side are bounded by a configurable idle timeout; on timeout
/// the channel yields control but remains active").
pub async fn read_one_line<R>(reader: &mut tokio::io::Lines<BufReader<R>>, idle_timeout: Duration) -> InboundLine
where
    R: tokio::io::AsyncRead + Unpin,
{
    match tokio::time::timeout(idle_timeout, reader.next_line()).await {
        Ok(Ok(Some(line))) => {
            if line.len() > MAX_MESSAGE_BYTES {
                InboundLine::TooLarge
            } else {
                InboundLine::Line(line)
            }
        }
        Ok(Ok(None)) => InboundLine::Eof,
        Ok(Err(e)) => {
            tracing::error!(target: "sidecar::ipc", error = %e, "fatal read failure on stdin");
            InboundLine::Eof
        }
        Err(_elapsed) => InboundLine::Idle,
    }
}

/// Runs the inbound loop: reads lines from stdin until EOF or `shutdown`
/// fires, handing each successfully-read line to `on_line`. An oversize line
/// is rejected directly via `output` (§4.1: "longer inputs are rejected with
/// an `error{INVALID_MESSAGE, recoverable:true}`") since it never reaches
/// `on_line`. EOF triggers an orderly shutdown via `shutdown.shutdown()`
/// rather than a panic (§4.1 failure modes).
pub async fn run_inbound_loop<F, Fut>(
    idle_timeout: Duration,
    shutdown: ShutdownHandle,
    output: OutputSink,
    mut on_line: F,
) where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        if !shutdown.is_running() {
            break;
        }
        let next = tokio::select! {
            _ = shutdown.wait() => break,
            line = read_one_line(&mut lines, idle_timeout) => line,
        };
        match next {
            InboundLine::Line(line) => on_line(line).await,
            InboundLine::TooLarge => {
                tracing::warn!(target: "sidecar::ipc", "rejected oversize inbound message");
                output.send(Outbound::error(
                    None,
                    "INVALID_MESSAGE",
                    format!("message exceeds {MAX_MESSAGE_BYTES} byte limit"),
                    true,
                ));
            }
            InboundLine::Idle => continue,
            InboundLine::Eof => {
                tracing::info!(target: "sidecar::ipc", "stdin closed, shutting down");
                shutdown.shutdown();
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writer_emits_newline_delimited_json() {
        let (sink, handle) = spawn_writer();
        sink.send(crate::messages::Outbound::pong("1".to_string()));
        drop(sink);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn read_one_line_returns_too_large_over_the_limit() {
        let oversized = "a".repeat(MAX_MESSAGE_BYTES + 1) + "\n";
        let reader = BufReader::new(oversized.as_bytes());
        let mut lines = reader.lines();
        match read_one_line(&mut lines, Duration::from_secs(1)).await {
            InboundLine::TooLarge => {}
            _ => panic!("expected TooLarge"),
        }
    }

    #[tokio::test]
    async fn read_one_line_returns_eof_on_empty_input() {
        let reader = BufReader::new("".as_bytes());
        let mut lines = reader.lines();
        match read_one_line(&mut lines, Duration::from_secs(1)).await {
            InboundLine::Eof => {}
            _ => panic!("expected Eof"),
        }
    }

    #[tokio::test]
    async fn read_one_line_returns_idle_on_timeout() {
        let (_tx, rx) = tokio::io::duplex(64);
        let reader = BufReader::new(rx);
        let mut lines = reader.lines();
        match read_one_line(&mut lines, Duration::from_millis(20)).await {
            InboundLine::Idle => {}
            _ => panic!("expected Idle"),
        }
    }
}
