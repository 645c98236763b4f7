//! ConsoleBuilder - ストア群の構築とワイヤリング
//!
//! # 方針
//! - グローバルなシングルトンは持たない。全ストアは `Console` が所有し、
//!   呼び出し側へは明示的なハンドルとして渡す
//! - 起動時検証（transport が無ければ build() で失敗）

use std::sync::Arc;
use std::time::Duration;

use crate::app::config::{ClientConfig, ConfigError};
use crate::app::dispatcher::Dispatcher;
use crate::app::gateway::RequestGateway;
use crate::app::progress::ProgressBridge;
use crate::impls::{InMemoryCredentialStore, ReqwestTransport};
use crate::ports::{
    Clock, CredentialStore, EventSink, IdGenerator, NoopEventSink, NoopSessionObserver,
    SessionObserver, SystemClock, Transport, TransportError, UlidGenerator,
};
use crate::store::{AssetStore, SocialStore, StagingStore, StoreContext, UiStore, VideoStore};

/// ConsoleBuilder は Console を構築
///
/// # 使用例
/// ```ignore
/// let console = ConsoleBuilder::new(ClientConfig::from_env()?)
///     .http(None)
///     .credentials(Arc::new(InMemoryCredentialStore::with_token(token)))
///     .build()?;
/// ```
pub struct ConsoleBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    /// `.http()` で指定された timeout（build 時に ReqwestTransport を作る）
    http: Option<Option<Duration>>,
    credentials: Option<Arc<dyn CredentialStore>>,
    session: Option<Arc<dyn SessionObserver>>,
    sink: Option<Arc<dyn EventSink>>,
    clock: Option<Arc<dyn Clock>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no transport configured; call .transport() or .http() before build()")]
    MissingTransport,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ConsoleBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            http: None,
            credentials: None,
            session: None,
            sink: None,
            clock: None,
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Real HTTP transport, created at build time.
    pub fn http(mut self, timeout: Option<Duration>) -> Self {
        self.http = Some(timeout);
        self
    }

    pub fn credentials(mut self, credentials: Arc<dyn CredentialStore>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn session_observer(mut self, session: Arc<dyn SessionObserver>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Console, BuildError> {
        let transport: Arc<dyn Transport> = match (self.transport, self.http) {
            (Some(transport), _) => transport,
            (None, Some(timeout)) => Arc::new(ReqwestTransport::new(timeout)?),
            (None, None) => return Err(BuildError::MissingTransport),
        };
        let credentials = self
            .credentials
            .unwrap_or_else(|| Arc::new(InMemoryCredentialStore::new()));
        let session = self
            .session
            .unwrap_or_else(|| Arc::new(NoopSessionObserver));
        let sink = self.sink.unwrap_or_else(|| Arc::new(NoopEventSink));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids: Arc<dyn IdGenerator> = Arc::new(UlidGenerator::new(Arc::clone(&clock)));

        let base_url = self.config.base_url()?;
        tracing::info!(%base_url, mode = ?self.config.concurrency_mode, "building console");

        let gateway = Arc::new(RequestGateway::new(
            base_url,
            transport,
            Arc::clone(&credentials),
            session,
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            sink,
            Arc::clone(&clock),
            Arc::clone(&ids),
            self.config.concurrency_mode,
        ));
        let ui = Arc::new(UiStore::new(
            self.config.toast_capacity,
            self.config.notification_capacity,
            clock,
            ids,
        ));
        let progress = Arc::new(ProgressBridge::new(Arc::clone(&ui)));

        let ctx = Arc::new(StoreContext {
            gateway,
            dispatcher,
            progress: Arc::clone(&progress),
            poll_interval: self.config.poll_interval(),
        });

        Ok(Console {
            assets: AssetStore::new(Arc::clone(&ctx)),
            staging: StagingStore::new(Arc::clone(&ctx)),
            videos: VideoStore::new(Arc::clone(&ctx)),
            social: SocialStore::new(ctx),
            ui,
            progress,
            credentials,
            config: self.config,
        })
    }
}

/// Console は全ストアの持ち主
///
/// ストアはどれも clone 可能なハンドル（内部は Arc）。
pub struct Console {
    pub assets: AssetStore,
    pub staging: StagingStore,
    pub videos: VideoStore,
    pub social: SocialStore,
    pub ui: Arc<UiStore>,
    pub progress: Arc<ProgressBridge>,
    pub credentials: Arc<dyn CredentialStore>,
    pub config: ClientConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::Environment;
    use crate::impls::ScriptedTransport;

    #[test]
    fn build_without_transport_fails() {
        let result = ConsoleBuilder::new(ClientConfig::default()).build();
        assert!(matches!(result, Err(BuildError::MissingTransport)));
    }

    #[test]
    fn production_build_without_origin_fails() {
        let config = ClientConfig {
            environment: Environment::Production,
            ..ClientConfig::default()
        };
        let result = ConsoleBuilder::new(config)
            .transport(Arc::new(ScriptedTransport::new()))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::Config(ConfigError::MissingOrigin))
        ));
    }

    #[test]
    fn build_applies_config_capacities() {
        let config = ClientConfig {
            toast_capacity: 2,
            ..ClientConfig::default()
        };
        let console = ConsoleBuilder::new(config)
            .transport(Arc::new(ScriptedTransport::new()))
            .build()
            .unwrap();

        for n in 0..4 {
            console
                .ui
                .push_toast(crate::domain::NotificationKind::Info, format!("t{n}"));
        }
        assert_eq!(console.ui.toasts().len(), 2);
        assert_eq!(console.credentials.get(), None);
    }
}
