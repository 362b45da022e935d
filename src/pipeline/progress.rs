use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};

/// Receives a completion percentage and a label after every node.
pub trait ProgressSink {
    fn update(&mut self, percent: f64, label: &str);
}

impl<F> ProgressSink for F
where
    F: FnMut(f64, &str),
{
    fn update(&mut self, percent: f64, label: &str) {
        self(percent, label)
    }
}

/// Discards all progress reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&mut self, _percent: f64, _label: &str) {}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    pub current_label: String,
    pub now: f64,
}

/// Progress that another thread can poll while a run is in flight.
#[derive(Debug, Clone, Default)]
pub struct SharedProgress {
    state: Arc<Mutex<ProgressState>>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ProgressState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressSink for SharedProgress {
    fn update(&mut self, percent: f64, label: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.now = percent;
        state.current_label = label.to_string();
    }
}
