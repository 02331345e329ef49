//! Event system for the engine
//!
//! Provides typed event emission for synchronizations, cancellations and
//! replica forks. Sinks only observe; nothing they do feeds back into a run.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::core::value::{ChannelId, ProcessId, Value};

/// Engine event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    Synchronized {
        step: u64,
        channel: ChannelId,
        sender: ProcessId,
        reader: ProcessId,
        value: Value,
    },
    NullStep {
        step: u64,
        channel: ChannelId,
    },
    Cancelled {
        channel: ChannelId,
        process: ProcessId,
        choice: ProcessId,
    },
    ReplicaForked {
        origin: ProcessId,
        replica: ProcessId,
        resume_at: usize,
    },
}

impl EngineEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::Synchronized { .. } => "synchronized",
            EngineEvent::NullStep { .. } => "null_step",
            EngineEvent::Cancelled { .. } => "cancelled",
            EngineEvent::ReplicaForked { .. } => "replica_forked",
        }
    }
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::Synchronized {
                step,
                channel,
                sender,
                reader,
                value,
            } => write!(f, "{:04}: {} -> {} on {}: {}", step, sender, reader, channel, value),
            EngineEvent::NullStep { step, channel } => {
                write!(f, "{:04}: {} had nothing left to pair", step, channel)
            }
            EngineEvent::Cancelled {
                channel,
                process,
                choice,
            } => write!(f, "{} withdrew {} from {}", choice, process, channel),
            EngineEvent::ReplicaForked {
                origin,
                replica,
                resume_at,
            } => write!(f, "{} forked {} at step {}", origin, replica, resume_at),
        }
    }
}

/// Event envelope with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub version: u32,
    pub sequence: u64,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: EngineEvent,
}

impl EventEnvelope {
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Event sink trait for emitting events
pub trait EventSink: Send + Sync {
    /// Emit an event
    fn emit(&self, envelope: &EventEnvelope);
}

/// Writes each event to the `tracing` log as one human-readable line
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn emit(&self, envelope: &EventEnvelope) {
        debug!(
            run_id = %envelope.run_id,
            sequence = envelope.sequence,
            kind = envelope.event.kind(),
            "{}",
            envelope.event
        );
    }
}

/// A buffering event sink that collects events
#[derive(Default)]
pub struct BufferingEventSink {
    events: RwLock<Vec<EventEnvelope>>,
}

impl BufferingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_events(&self) -> Vec<EventEnvelope> {
        self.events.read().clone()
    }

    /// Just the event payloads, in emission order
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.read().iter().map(|e| e.event.clone()).collect()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }
}

impl EventSink for BufferingEventSink {
    fn emit(&self, envelope: &EventEnvelope) {
        self.events.write().push(envelope.clone());
    }
}

/// Stamps events with the engine's run id and a per-engine sequence number
pub(crate) struct EventEmitter {
    run_id: String,
    sequence: u64,
    sink: Option<Arc<dyn EventSink>>,
}

impl EventEmitter {
    pub(crate) fn new() -> Self {
        Self {
            run_id: cuid2::create_id(),
            sequence: 0,
            sink: None,
        }
    }

    pub(crate) fn run_id(&self) -> &str {
        &self.run_id
    }

    pub(crate) fn set_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sink = Some(sink);
    }

    pub(crate) fn emit(&mut self, event: EngineEvent) {
        if let Some(sink) = &self.sink {
            let envelope = EventEnvelope {
                version: 1,
                sequence: self.sequence,
                run_id: self.run_id.clone(),
                timestamp: Utc::now(),
                event,
            };
            self.sequence += 1;
            sink.emit(&envelope);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitter_without_sink_is_silent() {
        let mut emitter = EventEmitter::new();
        emitter.emit(EngineEvent::NullStep {
            step: 1,
            channel: ChannelId(0),
        });
        assert!(!emitter.run_id().is_empty());
    }

    #[test]
    fn test_buffering_sink_sequences_events() {
        let sink = Arc::new(BufferingEventSink::new());
        let mut emitter = EventEmitter::new();
        emitter.set_sink(sink.clone());

        emitter.emit(EngineEvent::NullStep {
            step: 1,
            channel: ChannelId(0),
        });
        emitter.emit(EngineEvent::Cancelled {
            channel: ChannelId(1),
            process: ProcessId(2),
            choice: ProcessId(3),
        });

        let envelopes = sink.get_events();
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].sequence, 0);
        assert_eq!(envelopes[1].sequence, 1);
        assert_eq!(envelopes[0].run_id, envelopes[1].run_id);

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_event_lines() {
        let sync = EngineEvent::Synchronized {
            step: 7,
            channel: ChannelId(1),
            sender: ProcessId(2),
            reader: ProcessId(3),
            value: Value::from('x'),
        };
        assert_eq!(sync.kind(), "synchronized");
        assert!(sync.to_string().starts_with("0007: p2 -> p3 on c1"));

        let cancelled = EngineEvent::Cancelled {
            channel: ChannelId(4),
            process: ProcessId(5),
            choice: ProcessId(6),
        };
        assert_eq!(cancelled.to_string(), "p6 withdrew p5 from c4");

        // Logging never fails, with or without a subscriber installed
        LoggingEventSink.emit(&EventEnvelope {
            version: 1,
            sequence: 0,
            run_id: "run".to_string(),
            timestamp: Utc::now(),
            event: cancelled,
        });
    }

    #[test]
    fn test_envelope_serializes_with_tag() {
        let envelope = EventEnvelope {
            version: 1,
            sequence: 0,
            run_id: "run".to_string(),
            timestamp: Utc::now(),
            event: EngineEvent::Synchronized {
                step: 1,
                channel: ChannelId(0),
                sender: ProcessId(1),
                reader: ProcessId(2),
                value: Value::Int(42),
            },
        };
        let json = envelope.to_json().unwrap();
        assert_eq!(json["event"]["type"], "Synchronized");
        assert_eq!(json["event"]["value"]["value"], 42);
    }
}
