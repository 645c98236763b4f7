//! marquee-core
//!
//! Client-side state and synchronization core of the Marquee marketing console.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, item, asset, staging, video, social, filter, envelope, notification, errors）
//! - **ports**: 抽象化レイヤー（Transport, CredentialStore, SessionObserver, EventSink, Clock, IdGenerator）
//! - **impls**: 実装（ReqwestTransport、開発・テスト用の ScriptedTransport など）
//! - **app**: アプリケーションロジック（config, gateway, dispatcher, progress, builder）
//! - **store**: 状態コンテナ（assets, staging, videos, social, ui）と projection

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod store;

pub use app::{ClientConfig, Console, ConsoleBuilder, Settled};
