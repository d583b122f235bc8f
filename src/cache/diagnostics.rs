//! Non-fatal events raised while serving through the cache
//!
//! Store failures never reach the caller. They are logged with `tracing` and
//! broadcast to any subscriber so operators can alert on them.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;
use tracing::warn;

/// Capacity of the diagnostic channel; slow subscribers lose the oldest events
const CHANNEL_CAPACITY: usize = 256;

/// A degraded-but-answered condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The store has too many outstanding requests; the call bypassed it
    StoreSaturated { pending: usize, high_water: usize },

    /// Reading a key failed; the call fell back to upstream
    StoreReadFailed { key: String, error: String },

    /// Writing a key failed; the value was not cached
    StoreWriteFailed { key: String, error: String },

    /// A stored entry could not be decoded and was treated as a miss
    DecodeFailed { key: String, error: String },
}

impl Diagnostic {
    /// Key the event relates to, when there is one
    pub fn key(&self) -> Option<&str> {
        match self {
            Diagnostic::StoreSaturated { .. } => None,
            Diagnostic::StoreReadFailed { key, .. }
            | Diagnostic::StoreWriteFailed { key, .. }
            | Diagnostic::DecodeFailed { key, .. } => Some(key),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::StoreSaturated { pending, high_water } => write!(
                f,
                "store saturated: {} pending requests (high water mark {})",
                pending, high_water
            ),
            Diagnostic::StoreReadFailed { key, error } => {
                write!(f, "store read failed for {}: {}", key, error)
            }
            Diagnostic::StoreWriteFailed { key, error } => {
                write!(f, "store write failed for {}: {}", key, error)
            }
            Diagnostic::DecodeFailed { key, error } => {
                write!(f, "invalid cache entry for {}: {}", key, error)
            }
        }
    }
}

/// Fan-out point for diagnostics
#[derive(Debug, Clone)]
pub struct DiagnosticSink {
    tx: broadcast::Sender<Diagnostic>,
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Log the event and hand it to current subscribers
    pub fn emit(&self, diagnostic: Diagnostic) {
        warn!(key = diagnostic.key().unwrap_or("-"), "{}", diagnostic);
        // No subscribers is fine
        let _ = self.tx.send(diagnostic);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Diagnostic> {
        self.tx.subscribe()
    }
}
