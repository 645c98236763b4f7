//! EventSink port - ライフサイクルイベントの観測
//!
//! Dispatcher は pending / fulfilled / rejected の各フェーズをここに流す。
//! UI 層の購読やテストでのフェーズ順序検証に使う。

use crate::domain::OperationEnvelope;

pub trait EventSink: Send + Sync {
    fn emit(&self, envelope: &OperationEnvelope);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _envelope: &OperationEnvelope) {}
}
