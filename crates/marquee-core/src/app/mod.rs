//! App - アプリケーションロジック
//!
//! - **config**: 接続先・並行性モードの設定
//! - **gateway**: Transport の薄いラッパー（認証・失敗分類）
//! - **dispatcher**: pending → fulfilled | rejected のライフサイクル
//! - **progress**: 長時間ジョブの進捗・通知・ポーリング
//! - **builder**: ストア群のワイヤリング

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod gateway;
pub mod progress;

pub use self::builder::{BuildError, Console, ConsoleBuilder};
pub use self::config::{ClientConfig, ConcurrencyMode, ConfigError, Environment};
pub use self::dispatcher::{Dispatcher, PendingOperation, Settled};
pub use self::gateway::{GatewayError, RequestGateway};
pub use self::progress::{JobHandle, JobState, PollStatus, Pollable, ProgressBridge, ProgressTarget};
