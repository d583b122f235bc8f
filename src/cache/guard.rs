//! Backpressure guard in front of the store
//!
//! When the store already has `high_water` requests outstanding, new work
//! would only queue behind them. The guard refuses it instead and the call is
//! answered from upstream alone. It never waits and never retries.

use crate::cache::diagnostics::{Diagnostic, DiagnosticSink};
use crate::store::KvStore;

/// Whether a refusal should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Emit [`Diagnostic::StoreSaturated`] on refusal
    Report,

    /// Refuse silently; the caller already reported saturation for this call
    Quiet,
}

#[derive(Debug, Clone)]
pub struct BackpressureGuard {
    diagnostics: DiagnosticSink,
}

impl BackpressureGuard {
    pub fn new(diagnostics: DiagnosticSink) -> Self {
        Self { diagnostics }
    }

    /// Whether a new store request may be issued right now
    ///
    /// Emits [`Diagnostic::StoreSaturated`] on refusal.
    pub fn admit<S: KvStore + ?Sized>(&self, store: &S) -> bool {
        self.check(store, Admission::Report)
    }

    /// [`admit`](Self::admit) with control over the refusal diagnostic
    pub fn check<S: KvStore + ?Sized>(&self, store: &S, admission: Admission) -> bool {
        let pending = store.pending();
        let high_water = store.high_water();

        if pending < high_water {
            return true;
        }
        if admission == Admission::Quiet {
            return false;
        }

        self.diagnostics
            .emit(Diagnostic::StoreSaturated { pending, high_water });
        false
    }
}
