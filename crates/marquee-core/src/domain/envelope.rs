//! OperationEnvelope - 非同期操作 1 回分のライフサイクル
//!
//! # 状態遷移
//! - pending → fulfilled
//! - pending → rejected
//!
//! 終端フェーズはちょうど 1 回だけ発火する（`app::dispatcher` が保証）。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ErrorPayload;
use super::ids::OperationId;

/// Operation name such as `assets/fetch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationName(String);

impl OperationName {
    pub fn new(domain: &str, action: &str) -> Self {
        Self(format!("{domain}/{action}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Fulfilled,
    Rejected,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Phase::Pending)
    }
}

/// Terminal result carried by an envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Settlement {
    Value(serde_json::Value),
    Error(ErrorPayload),
}

/// {operation name, argument payload, phase, result-or-error}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEnvelope {
    pub id: OperationId,
    pub name: OperationName,
    pub args: serde_json::Value,
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement: Option<Settlement>,

    /// A terminal event of a dispatch that a newer dispatch for the same key
    /// superseded (only in latest-dispatch-wins mode). Containers ignore it.
    #[serde(default)]
    pub superseded: bool,

    pub at: DateTime<Utc>,
}

impl OperationEnvelope {
    pub fn pending(
        id: OperationId,
        name: OperationName,
        args: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            args,
            phase: Phase::Pending,
            settlement: None,
            superseded: false,
            at,
        }
    }

    pub fn fulfilled(&self, value: serde_json::Value, at: DateTime<Utc>) -> Self {
        Self {
            phase: Phase::Fulfilled,
            settlement: Some(Settlement::Value(value)),
            at,
            ..self.clone()
        }
    }

    pub fn rejected(&self, error: ErrorPayload, at: DateTime<Utc>) -> Self {
        Self {
            phase: Phase::Rejected,
            settlement: Some(Settlement::Error(error)),
            at,
            ..self.clone()
        }
    }

    /// `name/phase` form, e.g. `assets/fetch/pending`.
    pub fn event_type(&self) -> String {
        let phase = match self.phase {
            Phase::Pending => "pending",
            Phase::Fulfilled => "fulfilled",
            Phase::Rejected => "rejected",
        };
        format!("{}/{}", self.name, phase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn event_type_follows_name_phase_form() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let pending = OperationEnvelope::pending(
            OperationId::new("op-1"),
            OperationName::new("assets", "fetch"),
            serde_json::json!({}),
            at,
        );
        assert_eq!(pending.event_type(), "assets/fetch/pending");

        let rejected = pending.rejected(ErrorPayload::operation("boom"), at);
        assert_eq!(rejected.event_type(), "assets/fetch/rejected");
        assert_eq!(rejected.id, pending.id);
        assert!(rejected.phase.is_terminal());
    }
}
