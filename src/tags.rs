//! Thread-safe append-only collector for out-of-band diagnostic observations.
//!
//! One [`TagSink`] is allocated per engine invocation (see spec.md §9: the
//! source's process-wide singleton is replaced with a value threaded through
//! the call, eliminating cross-invocation leakage).

use std::sync::Mutex;

use crate::model::{DiagnosticTag, TagLevel};

#[derive(Default)]
pub struct TagSink {
    tags: Mutex<Vec<DiagnosticTag>>,
}

impl TagSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tag. Safe to call concurrently from many in-flight probes;
    /// FIFO within a single caller, no ordering guarantee across callers.
    pub fn emit(&self, level: TagLevel, id: u32, message: impl Into<String>, group: &'static str) {
        let tag = DiagnosticTag {
            id,
            level,
            message: message.into(),
            group,
        };
        self.tags.lock().expect("tag sink mutex poisoned").push(tag);
    }

    /// Return all tags appended so far and empty the sink atomically.
    /// A second immediate `drain` returns an empty vector.
    pub fn drain(&self) -> Vec<DiagnosticTag> {
        std::mem::take(&mut *self.tags.lock().expect("tag sink mutex poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_is_idempotent() {
        let sink = TagSink::new();
        sink.emit(TagLevel::Error, 0, "srv missing", "dns");
        assert_eq!(sink.drain().len(), 1);
        assert!(sink.drain().is_empty());
    }

    #[test]
    fn drain_empties_atomically() {
        let sink = TagSink::new();
        sink.emit(TagLevel::Warning, 3, "no A records", "dns");
        sink.emit(TagLevel::Warning, 4, "no AAAA records", "dns");
        let drained = sink.drain();
        assert_eq!(drained.len(), 2);
        assert!(sink.drain().is_empty());
    }
}
