//! Progress reporting and cooperative cancellation.
//!
//! The engine never logs or prints; callers that want feedback hand in a
//! [`ProgressSink`] and receive `(fraction, phase)` callbacks between outer
//! iterations. Cancellation is advisory: a [`CancelFlag`] raised from another
//! thread makes the engine return `Cancelled` at its next yield point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Named stages reported during an embed, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Encrypt,
    SelectPixels,
    PreparePointers,
    EncodeBytes,
    WritePixels,
    PackageKey,
    Done,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Encrypt => "encrypt",
            Phase::SelectPixels => "select-pixels",
            Phase::PreparePointers => "prepare-pointers",
            Phase::EncodeBytes => "encode-bytes",
            Phase::WritePixels => "write-pixels",
            Phase::PackageKey => "package-key",
            Phase::Done => "done",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver for progress callbacks. `fraction` is in `[0, 1]` and advances
/// once per ciphertext byte during `encode-bytes`.
pub trait ProgressSink {
    fn report(&mut self, fraction: f64, phase: Phase);
}

/// Sink that discards all reports.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn report(&mut self, _fraction: f64, _phase: Phase) {}
}

/// Adapter turning any closure into a sink.
pub struct SinkFn<F>(pub F);

impl<F: FnMut(f64, Phase)> ProgressSink for SinkFn<F> {
    fn report(&mut self, fraction: f64, phase: Phase) {
        (self.0)(fraction, phase)
    }
}

/// Clonable cancellation handle shared between the caller and the engine.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The engine observes this at its per-byte yield
    /// points and abandons the call; partially mutated grids are the
    /// caller's to discard.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names() {
        let order = [
            Phase::Encrypt,
            Phase::SelectPixels,
            Phase::PreparePointers,
            Phase::EncodeBytes,
            Phase::WritePixels,
            Phase::PackageKey,
            Phase::Done,
        ];
        let names: Vec<&str> = order.iter().map(|p| p.as_str()).collect();
        assert_eq!(
            names,
            [
                "encrypt",
                "select-pixels",
                "prepare-pointers",
                "encode-bytes",
                "write-pixels",
                "package-key",
                "done"
            ]
        );
    }

    #[test]
    fn test_closure_sink_collects_reports() {
        let mut seen = Vec::new();
        let mut sink = SinkFn(|fraction: f64, phase: Phase| seen.push((fraction, phase)));
        sink.report(0.0, Phase::Encrypt);
        sink.report(1.0, Phase::Done);
        drop(sink);
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].1, Phase::Done);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
