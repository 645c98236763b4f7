//! RecordingEventSink - 発火した envelope をすべて記録する（開発・テスト用）

use std::sync::Mutex;

use crate::domain::{OperationEnvelope, OperationId, Phase};
use crate::ports::EventSink;

#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<OperationEnvelope>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OperationEnvelope> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Observed phase sequence of one operation instance.
    pub fn phases_for(&self, id: &OperationId) -> Vec<Phase> {
        self.events()
            .into_iter()
            .filter(|e| &e.id == id)
            .map(|e| e.phase)
            .collect()
    }

    /// `name/phase` strings in emission order.
    pub fn event_types(&self) -> Vec<String> {
        self.events().iter().map(OperationEnvelope::event_type).collect()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, envelope: &OperationEnvelope) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(envelope.clone());
    }
}
