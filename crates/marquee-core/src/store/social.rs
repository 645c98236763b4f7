//! SocialStore - ソーシャル投稿のスケジューリングと接続済みプラットフォーム
//!
//! 投稿は添付アセットを ID でのみ参照する。解決は `AssetStore::lookup` で行う。

use std::ops::Deref;
use std::sync::{Arc, Mutex};

use crate::app::dispatcher::Settled;
use crate::domain::{FilterDescriptor, Platform, PlatformConnection, SocialPost};
use crate::store::container::ContainerState;
use crate::store::resource::{InFlight, Phase, Resource, ResourceStore, StoreContext};

pub const SOCIAL_DIMENSIONS: &[&str] = &["status", "platform", "tag"];

impl Resource for SocialPost {
    const DOMAIN: &'static str = "social";
    const PATH: &'static str = "/social/posts";
    const NOUN: &'static str = "post";
    const PLURAL: &'static str = "posts";

    fn default_filters() -> FilterDescriptor {
        FilterDescriptor::all_of(SOCIAL_DIMENSIONS)
    }
}

#[derive(Clone)]
pub struct SocialStore {
    inner: ResourceStore<SocialPost>,
    platforms: Arc<Mutex<Vec<PlatformConnection>>>,
}

impl Deref for SocialStore {
    type Target = ResourceStore<SocialPost>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl SocialStore {
    pub fn new(ctx: Arc<StoreContext>) -> Self {
        Self {
            inner: ResourceStore::new(ctx),
            platforms: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn platforms(&self) -> Vec<PlatformConnection> {
        self.lock_platforms().clone()
    }

    pub fn is_connected(&self, platform: Platform) -> bool {
        self.lock_platforms()
            .iter()
            .any(|c| c.platform == platform && c.connected)
    }

    fn lock_platforms(&self) -> std::sync::MutexGuard<'_, Vec<PlatformConnection>> {
        self.platforms
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub async fn fetch_platforms(&self) -> Settled<Vec<PlatformConnection>> {
        let container = self.inner.container().clone();
        let op = self.inner.begin("fetch_platforms", serde_json::Value::Null, None);
        container.update(ContainerState::fetch_pending);
        let guard = InFlight::new(&container, Phase::Fetch);

        let result = self
            .inner
            .context()
            .gateway
            .get::<Vec<PlatformConnection>>("/social/platforms")
            .await;
        let settled = op.settle(result, "failed to fetch platforms");
        guard.disarm();

        match &settled {
            Settled::Fulfilled(connections) => {
                *self.lock_platforms() = connections.clone();
                container.update(ContainerState::fetch_settled);
            }
            Settled::Rejected(err) => container.update(|s| s.fetch_rejected(err.clone())),
            Settled::Superseded => container.update(ContainerState::fetch_settled),
        }
        settled
    }

    /// Connect a platform; the answer replaces that platform's entry.
    pub async fn connect(&self, platform: Platform) -> Settled<PlatformConnection> {
        let gateway = Arc::clone(&self.inner.context().gateway);
        let path = format!("/social/connect/{}", platform.as_str());
        let settled = self
            .inner
            .mutate(
                "connect",
                serde_json::json!({ "platform": platform.as_str() }),
                Some(format!("social/connect:{}", platform.as_str())),
                async move {
                    gateway
                        .post::<_, PlatformConnection>(&path, &serde_json::json!({}))
                        .await
                },
                |s: &mut ContainerState<SocialPost>, _: &PlatformConnection| s.mutation_settled(),
            )
            .await;

        if let Settled::Fulfilled(connection) = &settled {
            let mut platforms = self.lock_platforms();
            match platforms.iter_mut().find(|c| c.platform == connection.platform) {
                Some(existing) => *existing = connection.clone(),
                None => platforms.push(connection.clone()),
            }
        }
        settled
    }
}
