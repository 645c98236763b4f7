//! IdGenerator port - ローカル ID 生成の抽象化
//!
//! Operation / 楽観的 pending item / Notification の ID をローカルで生成します。
//! サーバーが払い出す ID はここを通りません。

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::ids::{Id, IdMarker};
use crate::ports::Clock;

/// IdGenerator は ULID ベースの ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数タスクから使える）
pub trait IdGenerator: Send + Sync {
    fn next_ulid(&self) -> Ulid;
}

/// Typed convenience on top of any generator.
pub fn generate<T: IdMarker>(ids: &dyn IdGenerator) -> Id<T> {
    Id::from_ulid(ids.next_ulid())
}

/// UlidGenerator は Clock の時刻で ULID を生成する
///
/// FixedClock を使うと timestamp 部分が決定的になる。
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl IdGenerator for UlidGenerator {
    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}
