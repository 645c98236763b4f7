//! SessionObserver port - セッション失効の通知先（ナビゲーション層）

/// Notified after the gateway has cleared the credential on a 401-class
/// response. The navigation layer redirects to sign-in.
pub trait SessionObserver: Send + Sync {
    fn session_invalidated(&self);
}

/// Used when nothing needs to react (tests, headless tools).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionObserver;

impl SessionObserver for NoopSessionObserver {
    fn session_invalidated(&self) {}
}
