//! Ports - 抽象化レイヤー
//!
//! 外部の協調者（HTTP transport、credential store、ナビゲーション層、
//! UI の購読者、時刻、ID 生成）へのインターフェースを定義します。
//! 実装は `impls` に置き、コンテナには `Arc<dyn ...>` で注入する。

pub mod clock;
pub mod credential_store;
pub mod event_sink;
pub mod id_generator;
pub mod session;
pub mod transport;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::credential_store::CredentialStore;
pub use self::event_sink::{EventSink, NoopEventSink};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::session::{NoopSessionObserver, SessionObserver};
pub use self::transport::{
    Method, ProgressFn, RequestBody, Transport, TransportError, TransportRequest,
    TransportResponse,
};
