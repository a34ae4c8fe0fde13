//! Progress events emitted while harvesting or mutating.
//!
//! Every run reports through a [`ProgressSink`] under a run id that is
//! unique per invocation, so consumers can interleave events from
//! concurrent runs of different categories.

use std::io::Write;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::mutate::MutationKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressEvent {
    ItemsProgress {
        run_id: String,
        found: usize,
        offset: u64,
    },
    ItemsDone {
        run_id: String,
        total: usize,
        elapsed_ms: u64,
    },
    ContainersProgress {
        run_id: String,
        processed: usize,
        kept: usize,
        listed: usize,
        items: usize,
        container_id: String,
        out_of_scope: bool,
    },
    ContainersDone {
        run_id: String,
        processed: usize,
        kept: usize,
        items: usize,
        elapsed_ms: u64,
    },
    MutationProgress {
        run_id: String,
        op: MutationKind,
        i: usize,
        total: usize,
        id: String,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        attempt: u32,
        elapsed_ms: u64,
        last_op_ms: u64,
    },
    MutationDone {
        run_id: String,
        op: MutationKind,
        total: usize,
        ok_count: usize,
        fail_count: usize,
        elapsed_ms: u64,
    },
    CreateContainerProgress {
        run_id: String,
        phase: CreatePhase,
    },
    CreateContainerDone {
        run_id: String,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        container_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        elapsed_ms: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatePhase {
    Starting,
    Sending,
    Parsing,
}

pub trait ProgressSink {
    fn emit(&self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Forwards events to an unbounded channel; a closed receiver drops them.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

/// Writes one JSON document per event and line.
pub struct JsonLinesSink<W> {
    out: Mutex<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Writes any serializable value as one line; replies share the stream
    /// with events.
    pub fn write_json<T: Serialize + ?Sized>(&self, value: &T) {
        let line = match serde_json::to_string(value) {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(%err, "failed to encode json line");
                return;
            }
        };
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            tracing::warn!(%err, "failed to write json line");
        }
    }
}

impl<W: Write> ProgressSink for JsonLinesSink<W> {
    fn emit(&self, event: ProgressEvent) {
        self.write_json(&event);
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// `<epoch-ms>-<random hex>`.
pub fn new_run_id() -> String {
    let epoch_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("{epoch_ms}-{:x}", rand::random::<u64>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        let first = new_run_id();
        let second = new_run_id();
        assert_ne!(first, second);
        assert!(first.contains('-'));
    }

    #[test]
    fn json_lines_sink_writes_tagged_events() {
        let sink = JsonLinesSink::new(Vec::new());
        sink.emit(ProgressEvent::MutationDone {
            run_id: "r1".into(),
            op: MutationKind::HideItem,
            total: 3,
            ok_count: 2,
            fail_count: 1,
            elapsed_ms: 10,
        });
        sink.emit(ProgressEvent::ItemsProgress {
            run_id: "r2".into(),
            found: 4,
            offset: 50,
        });

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["type"], "MUTATION_DONE");
        assert_eq!(lines[0]["op"], "hide-item");
        assert_eq!(lines[0]["fail_count"], 1);
        assert_eq!(lines[1]["type"], "ITEMS_PROGRESS");
        assert_eq!(lines[1]["found"], 4);
    }

    #[test]
    fn mutation_progress_omits_absent_status() {
        let event = ProgressEvent::MutationProgress {
            run_id: "r".into(),
            op: MutationKind::DeleteContainer,
            i: 1,
            total: 1,
            id: "g".into(),
            ok: false,
            status: None,
            error: Some("Missing id".into()),
            attempt: 1,
            elapsed_ms: 0,
            last_op_ms: 0,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("status").is_none());
        assert_eq!(value["error"], "Missing id");
    }

    #[test]
    fn channel_sink_survives_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        ChannelSink::new(tx).emit(ProgressEvent::ItemsDone {
            run_id: "r".into(),
            total: 0,
            elapsed_ms: 0,
        });
    }
}
