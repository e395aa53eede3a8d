//! Migration phases, log events and the sink they are delivered to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Coarse progress of a migration attempt, in execution order.
///
/// `Metadata`, `Data` and `Index` are derived from tool output and may
/// interleave while a dump or restore is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MigrationPhase {
    Discovery,
    Dumping,
    Preparing,
    Restoring,
    Metadata,
    Data,
    Index,
    Validation,
    Success,
    Failed,
}

impl MigrationPhase {
    /// Marker name used in the `PHASE:<NAME>|text` convention.
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationPhase::Discovery => "DISCOVERY",
            MigrationPhase::Dumping => "DUMPING",
            MigrationPhase::Preparing => "PREPARING",
            MigrationPhase::Restoring => "RESTORING",
            MigrationPhase::Metadata => "METADATA",
            MigrationPhase::Data => "DATA",
            MigrationPhase::Index => "INDEX",
            MigrationPhase::Validation => "VALIDATION",
            MigrationPhase::Success => "SUCCESS",
            MigrationPhase::Failed => "FAILED",
        }
    }

    /// Parse a marker name back into a phase.
    pub fn from_marker(name: &str) -> Option<Self> {
        let phase = match name {
            "DISCOVERY" => MigrationPhase::Discovery,
            "DUMPING" => MigrationPhase::Dumping,
            "PREPARING" => MigrationPhase::Preparing,
            "RESTORING" => MigrationPhase::Restoring,
            "METADATA" => MigrationPhase::Metadata,
            "DATA" => MigrationPhase::Data,
            "INDEX" => MigrationPhase::Index,
            "VALIDATION" => MigrationPhase::Validation,
            "SUCCESS" => MigrationPhase::Success,
            "FAILED" => MigrationPhase::Failed,
            _ => return None,
        };
        Some(phase)
    }
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single line of migration output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,

    /// Set when this event marks a phase transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<MigrationPhase>,

    pub text: String,
}

impl LogEvent {
    /// Plain output or informational line.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            phase: None,
            text: text.into(),
        }
    }

    /// Phase transition marker.
    pub fn phase(phase: MigrationPhase, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            phase: Some(phase),
            text: text.into(),
        }
    }

    /// Render for a line-oriented stream: `PHASE:<NAME>|text` or the bare text.
    pub fn to_wire(&self) -> String {
        match self.phase {
            Some(phase) => format!("PHASE:{}|{}", phase.as_str(), self.text),
            None => self.text.clone(),
        }
    }

    /// Inverse of [`LogEvent::to_wire`]. Unknown markers are kept as plain text.
    pub fn from_wire(line: &str) -> Self {
        if let Some(rest) = line.strip_prefix("PHASE:") {
            if let Some((name, text)) = rest.split_once('|') {
                if let Some(phase) = MigrationPhase::from_marker(name) {
                    return Self::phase(phase, text);
                }
            }
        }
        Self::info(line)
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Consumer of migration log events.
///
/// `emit` is called from the task that reads child process output, so
/// implementations must not block; buffer instead.
pub trait LogSink: Send + Sync {
    fn emit(&self, event: LogEvent);
}

impl LogSink for mpsc::UnboundedSender<LogEvent> {
    fn emit(&self, event: LogEvent) {
        // Receiver gone means nobody is listening any more.
        let _ = self.send(event);
    }
}

/// Sink that keeps every event in memory, for tests and short-lived callers.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Emitted lines in wire format.
    pub fn lines(&self) -> Vec<String> {
        self.events().iter().map(LogEvent::to_wire).collect()
    }

    /// Phases in the order their markers were emitted.
    pub fn phases(&self) -> Vec<MigrationPhase> {
        self.events().iter().filter_map(|e| e.phase).collect()
    }
}

impl LogSink for MemorySink {
    fn emit(&self, event: LogEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
