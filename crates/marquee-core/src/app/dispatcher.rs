//! Dispatcher - 非同期操作を pending → fulfilled | rejected のライフサイクルに包む
//!
//! # 保証
//! - 1 回の dispatch につき pending が必ず先に発火する（`begin()` 内で emit）
//! - 終端フェーズはちょうど 1 回（`settle()` が self を消費する。
//!   settle されずに drop された場合は rejected を発火する）
//! - 同じ名前の dispatch 同士は独立（重複排除・キャンセルはしない）
//!
//! `ConcurrencyMode::LatestDispatchWins` では、同じ key の新しい dispatch に
//! 追い越された古い dispatch の終端を `Settled::Superseded` として返す。
//! envelope 自体は `superseded = true` 付きで発火する。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::app::config::ConcurrencyMode;
use crate::app::gateway::GatewayError;
use crate::domain::{ErrorPayload, OperationEnvelope, OperationId, OperationName};
use crate::ports::id_generator::generate;
use crate::ports::{Clock, EventSink, IdGenerator};

const CANCELLED_MESSAGE: &str = "operation cancelled";

/// Typed terminal result handed back to the container that dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled<T> {
    Fulfilled(T),
    Rejected(ErrorPayload),
    /// A newer dispatch for the same key exists; the result must not be reduced.
    Superseded,
}

impl<T> Settled<T> {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Settled::Fulfilled(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            Settled::Fulfilled(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorPayload> {
        match self {
            Settled::Rejected(err) => Some(err),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Settled<U> {
        match self {
            Settled::Fulfilled(value) => Settled::Fulfilled(f(value)),
            Settled::Rejected(err) => Settled::Rejected(err),
            Settled::Superseded => Settled::Superseded,
        }
    }
}

pub struct Dispatcher {
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    mode: ConcurrencyMode,
    /// dispatch key → (最新の operation id, 未完了の dispatch 数)
    latest: Mutex<HashMap<String, (OperationId, usize)>>,
}

impl Dispatcher {
    pub fn new(
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        mode: ConcurrencyMode,
    ) -> Self {
        Self {
            sink,
            clock,
            ids,
            mode,
            latest: Mutex::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> ConcurrencyMode {
        self.mode
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn ids(&self) -> &Arc<dyn IdGenerator> {
        &self.ids
    }

    /// Emit `name/pending(args)` and return the handle that must settle it.
    ///
    /// `key` identifies what the operation writes (e.g. `assets/item:a1`);
    /// it only matters in latest-dispatch-wins mode.
    pub fn begin(
        self: &Arc<Self>,
        name: OperationName,
        args: serde_json::Value,
        key: Option<String>,
    ) -> PendingOperation {
        let id: OperationId = generate(self.ids.as_ref());
        if let Some(key) = &key {
            let mut latest = self.lock_latest();
            let entry = latest.entry(key.clone()).or_insert_with(|| (id.clone(), 0));
            entry.0 = id.clone();
            entry.1 += 1;
        }
        let envelope = OperationEnvelope::pending(id, name, args, self.clock.now());
        tracing::debug!(op = %envelope.id, event = %envelope.event_type(), "dispatch");
        self.sink.emit(&envelope);

        PendingOperation {
            dispatcher: Arc::clone(self),
            envelope,
            key,
            settled: false,
        }
    }

    fn lock_latest(&self) -> std::sync::MutexGuard<'_, HashMap<String, (OperationId, usize)>> {
        self.latest
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Returns whether a newer dispatch for the same key superseded `id`.
    fn release(&self, key: Option<&str>, id: &OperationId) -> bool {
        let Some(key) = key else {
            return false;
        };
        let mut latest = self.lock_latest();
        let Some((current, in_flight)) = latest.get_mut(key) else {
            return false;
        };
        let stale = &*current != id;
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            latest.remove(key);
        }
        stale && self.mode == ConcurrencyMode::LatestDispatchWins
    }
}

/// An operation whose pending phase has fired and whose terminal phase has not.
pub struct PendingOperation {
    dispatcher: Arc<Dispatcher>,
    envelope: OperationEnvelope,
    key: Option<String>,
    settled: bool,
}

impl PendingOperation {
    pub fn id(&self) -> &OperationId {
        &self.envelope.id
    }

    pub fn envelope(&self) -> &OperationEnvelope {
        &self.envelope
    }

    /// Emit the single terminal phase for a gateway result.
    pub fn settle<T: Serialize>(
        self,
        result: Result<T, GatewayError>,
        fallback: &str,
    ) -> Settled<T> {
        match result {
            Ok(value) => self.fulfill(value),
            Err(err) => self.reject(err.to_payload(fallback)),
        }
    }

    pub fn fulfill<T: Serialize>(mut self, value: T) -> Settled<T> {
        let json = serde_json::to_value(&value).unwrap_or(serde_json::Value::Null);
        let mut terminal = self.envelope.fulfilled(json, self.dispatcher.clock.now());
        let superseded = self.finish(&mut terminal);
        if superseded {
            Settled::Superseded
        } else {
            Settled::Fulfilled(value)
        }
    }

    pub fn reject<T>(mut self, error: ErrorPayload) -> Settled<T> {
        let mut terminal = self
            .envelope
            .rejected(error.clone(), self.dispatcher.clock.now());
        let superseded = self.finish(&mut terminal);
        if superseded {
            Settled::Superseded
        } else {
            Settled::Rejected(error)
        }
    }

    fn finish(&mut self, terminal: &mut OperationEnvelope) -> bool {
        self.settled = true;
        let superseded = self
            .dispatcher
            .release(self.key.as_deref(), &self.envelope.id);
        terminal.superseded = superseded;

        match &terminal.settlement {
            Some(crate::domain::Settlement::Error(err)) => {
                tracing::warn!(op = %terminal.id, event = %terminal.event_type(), error = %err, superseded, "settled");
            }
            _ => {
                tracing::debug!(op = %terminal.id, event = %terminal.event_type(), superseded, "settled");
            }
        }
        self.dispatcher.sink.emit(terminal);
        superseded
    }
}

impl Drop for PendingOperation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // dispatch した future が途中で drop された
        let mut terminal = self.envelope.rejected(
            ErrorPayload::operation(CANCELLED_MESSAGE),
            self.dispatcher.clock.now(),
        );
        self.finish(&mut terminal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Phase;
    use crate::impls::RecordingEventSink;
    use crate::ports::{SystemClock, UlidGenerator};

    fn dispatcher(mode: ConcurrencyMode) -> (Arc<Dispatcher>, Arc<RecordingEventSink>) {
        let sink = Arc::new(RecordingEventSink::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids = Arc::new(UlidGenerator::new(clock.clone()));
        (Arc::new(Dispatcher::new(sink.clone(), clock, ids, mode)), sink)
    }

    fn name() -> OperationName {
        OperationName::new("assets", "update")
    }

    #[test]
    fn phases_are_pending_then_one_terminal() {
        let (d, sink) = dispatcher(ConcurrencyMode::LastTerminalWins);

        let ok = d.begin(name(), serde_json::json!({"id": "a1"}), None);
        let ok_id = ok.id().clone();
        assert_eq!(ok.settle(Ok(1u32), "fallback"), Settled::Fulfilled(1));

        let bad = d.begin(name(), serde_json::json!({"id": "a2"}), None);
        let bad_id = bad.id().clone();
        let settled: Settled<u32> = bad.settle(
            Err(GatewayError::Http { status: 500, message: None }),
            "failed to update asset",
        );

        assert_eq!(sink.phases_for(&ok_id), vec![Phase::Pending, Phase::Fulfilled]);
        assert_eq!(sink.phases_for(&bad_id), vec![Phase::Pending, Phase::Rejected]);
        assert_eq!(settled.error().map(|e| e.message.as_str()), Some("failed to update asset"));
    }

    #[test]
    fn dropped_operation_still_rejects_once() {
        let (d, sink) = dispatcher(ConcurrencyMode::LastTerminalWins);
        let op = d.begin(name(), serde_json::Value::Null, None);
        let id = op.id().clone();
        drop(op);

        assert_eq!(sink.phases_for(&id), vec![Phase::Pending, Phase::Rejected]);
    }

    #[test]
    fn last_terminal_wins_applies_every_result() {
        let (d, _sink) = dispatcher(ConcurrencyMode::LastTerminalWins);
        let key = Some("assets/item:a1".to_string());
        let first = d.begin(name(), serde_json::Value::Null, key.clone());
        let second = d.begin(name(), serde_json::Value::Null, key);

        assert_eq!(second.fulfill("second"), Settled::Fulfilled("second"));
        assert_eq!(first.fulfill("first"), Settled::Fulfilled("first"));
    }

    #[test]
    fn latest_dispatch_wins_discards_stale_terminal() {
        let (d, sink) = dispatcher(ConcurrencyMode::LatestDispatchWins);
        let key = Some("assets/item:a1".to_string());
        let first = d.begin(name(), serde_json::Value::Null, key.clone());
        let first_id = first.id().clone();
        let second = d.begin(name(), serde_json::Value::Null, key);

        assert_eq!(second.fulfill("second"), Settled::Fulfilled("second"));
        assert_eq!(first.fulfill("first"), Settled::Superseded);

        // the stale dispatch still reports exactly one terminal phase
        assert_eq!(sink.phases_for(&first_id), vec![Phase::Pending, Phase::Fulfilled]);
        let stale = sink
            .events()
            .into_iter()
            .find(|e| e.id == first_id && e.phase.is_terminal())
            .unwrap();
        assert!(stale.superseded);
    }

    #[test]
    fn different_keys_never_supersede() {
        let (d, _sink) = dispatcher(ConcurrencyMode::LatestDispatchWins);
        let a = d.begin(name(), serde_json::Value::Null, Some("assets/item:a1".into()));
        let b = d.begin(name(), serde_json::Value::Null, Some("assets/item:a2".into()));

        assert!(b.fulfill(()).is_fulfilled());
        assert!(a.fulfill(()).is_fulfilled());
    }
}
