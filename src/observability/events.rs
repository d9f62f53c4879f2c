//! Structured event stream for `partyline`.
//!
//! Discrete, typed events emitted while sessions run. Events are
//! serialized as newline-delimited JSON (JSONL) and include a monotonically
//! increasing sequence number for ordering.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during `partyline` operation.
///
/// Each variant is tagged with `"type"` when serialized to JSON so consumers
/// can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A session was created by a `play` command.
    SessionCreated {
        /// When the session was created.
        timestamp: DateTime<Utc>,
        /// Session identifier.
        session_id: String,
        /// Game identifier (e.g. `"spycheck"`).
        game: String,
        /// Host participant id.
        host: String,
        /// Channel the session is bound to.
        channel: String,
    },

    /// A phase has been entered.
    PhaseEntered {
        /// When the phase was entered.
        timestamp: DateTime<Utc>,
        /// Session identifier.
        session_id: String,
        /// Phase kind (e.g. `"PROCESS_ROUND"`).
        phase: String,
    },

    /// A voting window was tallied.
    VoteTallied {
        /// When the tally ran.
        timestamp: DateTime<Utc>,
        /// Session identifier.
        session_id: String,
        /// Number of distinct voters.
        voters: usize,
        /// Elimination target, or `None` for "no elimination".
        decision: Option<String>,
    },

    /// A participant was removed from the living set.
    ParticipantEliminated {
        /// When the elimination happened.
        timestamp: DateTime<Utc>,
        /// Session identifier.
        session_id: String,
        /// Eliminated participant id.
        participant: String,
        /// Whether the participant held the hidden role.
        was_spy: bool,
    },

    /// A session expired.
    SessionExpired {
        /// When the session expired.
        timestamp: DateTime<Utc>,
        /// Session identifier.
        session_id: String,
        /// Human-readable reason.
        reason: String,
    },

    /// An inbound action matched no session.
    ActionDropped {
        /// When the action was dropped.
        timestamp: DateTime<Utc>,
        /// Acting user id.
        actor: String,
        /// Custom id of the action.
        custom_id: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope (adds sequence number via serde flatten)
// ---------------------------------------------------------------------------

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Each call to [`emit`](Self::emit) atomically increments the sequence
/// counter, serializes the event as a single JSON line, and flushes the
/// underlying writer. Serialization or I/O failures are silently dropped.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn contents(&self) -> String {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf).into_owned()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn created() -> Event {
        Event::SessionCreated {
            timestamp: DateTime::parse_from_rfc3339("2026-03-01T20:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            session_id: "s-1".to_owned(),
            game: "spycheck".to_owned(),
            host: "u1".to_owned(),
            channel: "c1".to_owned(),
        }
    }

    #[test]
    fn emitter_writes_flat_jsonl_with_sequence() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(created());
        emitter.emit(Event::VoteTallied {
            timestamp: Utc::now(),
            session_id: "s-1".to_owned(),
            voters: 4,
            decision: None,
        });

        assert_eq!(emitter.event_count(), 2);
        let lines: Vec<serde_json::Value> = tw
            .contents()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[0]["type"], "SessionCreated");
        assert_eq!(lines[0]["game"], "spycheck");
        assert!(lines[0].get("event").is_none());
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["decision"], serde_json::Value::Null);
    }

    #[test]
    fn noop_emitter_counts_but_discards() {
        let emitter = EventEmitter::noop();
        emitter.emit(Event::ActionDropped {
            timestamp: Utc::now(),
            actor: "u9".to_owned(),
            custom_id: "join".to_owned(),
        });
        assert_eq!(emitter.event_count(), 1);
    }
}
