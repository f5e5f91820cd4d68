//! Observability sink for tree construction and evaluation events
//!
//! The model never talks to a process-global logger. Anything that wants
//! build or evaluation diagnostics injects a [`TraceSink`] into the tree;
//! the default sink discards every event.

use crate::core::param::EvalMode;

/// Receives diagnostic events from a power tree.
///
/// Every method has an empty default body, so implementors override only the
/// events they care about.
pub trait TraceSink: Send + Sync {
    /// A source was registered as a tree root.
    fn source_added(&self, _id: u32, _name: &str) {}

    /// A load or switch was attached under a parent.
    fn load_added(&self, _parent_id: u32, _id: u32, _name: &str) {}

    /// An evaluation pass finished for one source.
    fn pass_completed(&self, _source_id: u32, _mode: EvalMode, _total_current: f64) {}
}

/// Default sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTrace;

impl TraceSink for NoopTrace {}

/// Test sink that records every event it sees.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingTrace {
    pub events: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingTrace {
    pub fn take(&self) -> Vec<String> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
impl TraceSink for RecordingTrace {
    fn source_added(&self, id: u32, name: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push(format!("source_added {} {}", id, name));
        }
    }

    fn load_added(&self, parent_id: u32, id: u32, name: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push(format!("load_added {} {} {}", parent_id, id, name));
        }
    }

    fn pass_completed(&self, source_id: u32, mode: EvalMode, total_current: f64) {
        if let Ok(mut events) = self.events.lock() {
            events.push(format!(
                "pass_completed {} {} {:.6}",
                source_id, mode, total_current
            ));
        }
    }
}
