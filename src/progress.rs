//! Progress events emitted while a document is processed.
//!
//! The sink is optional: the pipeline behaves identically whether or not one
//! is attached, and never depends on a sink's return value.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

/// One step of pipeline progress, tagged for the consuming UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Document opened and validated; page loop about to start.
    Loading { total_pages: usize },
    /// Page is being rasterized.
    Converting { page: usize, total: usize },
    /// Page is being recognized; `percent` is whole percents 0-100.
    Ocr { page: usize, total: usize, percent: u8 },
    /// Page degraded to a marker in the aggregate text.
    Fallback { page: usize, message: String },
    /// Page failed; the run continues with the next page.
    PageFailed { page: usize, message: String },
}

/// Receives progress events. Implementations must tolerate being called from
/// a blocking worker thread.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Emit to an optional sink.
pub(crate) fn emit(sink: &Option<Arc<dyn ProgressSink>>, event: ProgressEvent) {
    if let Some(sink) = sink {
        sink.emit(event);
    }
}

/// Test sink that records every event in order.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<ProgressEvent> {
        self.events.lock().expect("sink poisoned").clone()
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().expect("sink poisoned").push(event);
    }
}
