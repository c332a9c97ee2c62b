//! gz-logging: NDJSON search events.
//!
//! One JSON line per completed search, appended to a log file for run
//! post-mortems. Search events arrive once per move, not once per
//! simulation, so the log defaults to flushing every line; callers
//! that batch many games into one file can opt into buffering.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Summary of the root visit distribution.
#[derive(Debug, Clone, Serialize)]
pub struct PiSummaryV1 {
    /// Shannon entropy of the visit fractions, in nats.
    pub entropy: f32,
    pub max_p: f32,
    /// Move text of the most-visited child.
    pub argmax: String,
}

/// One completed search at some root.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRootEventV1 {
    pub event: &'static str,
    pub ts_ms: u64,

    pub run_id: String,
    pub ply: u32,
    /// "b" or "w".
    pub to_move: char,

    /// Move text of the chosen move.
    pub chosen: String,
    pub root_visits: u32,
    /// Winrate of the side to move at the root.
    pub root_winrate: f32,
    pub node_count: usize,

    pub pi: PiSummaryV1,
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("log file: {0}")]
    Io(#[from] std::io::Error),
    #[error("event encoding: {0}")]
    Encode(#[from] serde_json::Error),
}

/// When an appended event reaches the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Flush after every event. A crashed run loses at most the line
    /// being written.
    EveryEvent,
    /// Let the writer buffer; the caller flushes at checkpoints.
    Buffered,
}

/// An append-only event log, one JSON object per line.
///
/// Each event is serialized in full before any byte reaches the file,
/// so an encoding failure never leaves a torn line behind.
pub struct EventLog {
    out: BufWriter<File>,
    policy: FlushPolicy,
}

impl EventLog {
    /// Append to `path`, creating the file if needed. Every event is
    /// flushed as it is written.
    pub fn append(path: impl AsRef<Path>) -> Result<Self, LogError> {
        Self::with_policy(path, FlushPolicy::EveryEvent)
    }

    pub fn with_policy(path: impl AsRef<Path>, policy: FlushPolicy) -> Result<Self, LogError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: BufWriter::new(file),
            policy,
        })
    }

    /// Serialize `event` and append it as one line.
    pub fn append_event<T: Serialize>(&mut self, event: &T) -> Result<(), LogError> {
        let line = serde_json::to_string(event)?;
        writeln!(self.out, "{line}")?;
        if self.policy == FlushPolicy::EveryEvent {
            self.out.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), LogError> {
        self.out.flush()?;
        Ok(())
    }
}
