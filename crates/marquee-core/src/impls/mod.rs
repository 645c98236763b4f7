//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **ReqwestTransport**: 本番用の HTTP transport
//! - **InMemoryCredentialStore**: プロセス内の credential 保持
//! - **ScriptedTransport**: 開発・テスト用の in-process transport
//! - **RecordingEventSink**: ライフサイクルイベントの記録（テスト用）

pub mod inmem_credentials;
pub mod recording_sink;
pub mod reqwest_transport;
pub mod scripted_transport;

pub use self::inmem_credentials::InMemoryCredentialStore;
pub use self::recording_sink::RecordingEventSink;
pub use self::reqwest_transport::ReqwestTransport;
pub use self::scripted_transport::{RecordedRequest, ScriptedTransport};
