//! ResourceStore - コンテナ + gateway + dispatcher をまとめた汎用ストア
//!
//! fetch / create / update / delete の 4 操作はどのドメインでも同じ形なので
//! ここで一度だけ実装する。ドメイン固有の操作は各ストアが
//! `fetch_list()` / `mutate()` の上に組み立てる。
//!
//! どの操作も `Settled` を返し、失敗は呼び出し側に throw しない
//! （コンテナの `error` に還元済み）。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::app::dispatcher::{Dispatcher, Settled};
use crate::app::gateway::{self, GatewayError, RequestGateway, with_query};
use crate::app::progress::{JobHandle, Pollable, ProgressBridge, ProgressTarget, spawn_watcher};
use crate::domain::{FilterDescriptor, FilterPatch, Id, Item, OperationId, OperationName, SortKey};
use crate::ports::id_generator::generate;
use crate::store::container::{Container, ContainerState};

/// Shared collaborators handed to every store.
pub struct StoreContext {
    pub gateway: Arc<RequestGateway>,
    pub dispatcher: Arc<Dispatcher>,
    pub progress: Arc<ProgressBridge>,
    pub poll_interval: Duration,
}

/// An item kind served by a REST collection.
pub trait Resource: Item {
    /// Operation-name prefix, e.g. `assets`.
    const DOMAIN: &'static str;
    /// Collection path; items live at `{PATH}/{id}`.
    const PATH: &'static str;
    const CREATE_PATH: &'static str = Self::PATH;
    const NOUN: &'static str;
    const PLURAL: &'static str;

    fn default_filters() -> FilterDescriptor;
}

pub struct ResourceStore<T: Resource> {
    container: Container<T>,
    ctx: Arc<StoreContext>,
}

impl<T: Resource> Clone for ResourceStore<T> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl<T: Resource> ResourceStore<T> {
    pub fn new(ctx: Arc<StoreContext>) -> Self {
        Self {
            container: Container::new(T::default_filters()),
            ctx,
        }
    }

    pub fn container(&self) -> &Container<T> {
        &self.container
    }

    pub fn context(&self) -> &Arc<StoreContext> {
        &self.ctx
    }

    pub fn state(&self) -> ContainerState<T> {
        self.container.snapshot()
    }

    pub fn read<R>(&self, f: impl FnOnce(&ContainerState<T>) -> R) -> R {
        self.container.read(f)
    }

    pub fn get(&self, id: &Id<T::Marker>) -> Option<T> {
        self.container.read(|s| s.get(id).cloned())
    }

    pub fn visible(&self) -> Vec<T> {
        self.container.read(ContainerState::visible)
    }

    pub fn visible_sorted(&self, sort: Option<&SortKey>) -> Vec<T> {
        self.container.read(|s| s.visible_sorted(sort))
    }

    // --- local-only commands ---

    pub fn toggle_selection(&self, id: &Id<T::Marker>) {
        self.container.update(|s| s.toggle_selection(id));
    }

    pub fn set_selection(&self, ids: &[Id<T::Marker>]) {
        self.container.update(|s| s.set_selection(ids));
    }

    pub fn select_all(&self) {
        self.container.update(ContainerState::select_all);
    }

    pub fn clear_selection(&self) {
        self.container.update(ContainerState::clear_selection);
    }

    pub fn set_filters(&self, patch: &FilterPatch) {
        self.container.update(|s| s.set_filters(patch));
    }

    pub fn clear_filters(&self) {
        self.container.update(ContainerState::clear_filters);
    }

    pub fn set_mutation_progress(&self, percent: u8) {
        self.container.update(|s| s.set_mutation_progress(percent));
    }

    pub fn clear_error(&self) {
        self.container.update(ContainerState::clear_error);
    }

    // --- remote operations ---

    /// Merge `patch` into the filters, then fetch with the result.
    pub async fn fetch(&self, patch: &FilterPatch) -> Settled<Vec<T>> {
        let filters = self.container.update(|s| {
            s.set_filters(patch);
            s.filters().clone()
        });
        let path = with_query(T::PATH, &filters.to_query_pairs());
        self.fetch_list("fetch", args(&filters), path).await
    }

    pub async fn create<B: Serialize + Sync>(&self, body: &B) -> Settled<T> {
        self.create_at("create", T::CREATE_PATH, body).await
    }

    /// Replaces the item wholesale with the server's answer; unknown ids are a no-op.
    pub async fn update<P: Serialize + Sync>(&self, id: &Id<T::Marker>, patch: &P) -> Settled<T> {
        let path = self.item_path(id);
        let gateway = Arc::clone(&self.ctx.gateway);
        self.mutate(
            "update",
            serde_json::json!({ "id": id.as_str(), "patch": args(patch) }),
            Some(self.item_key(id)),
            async move { gateway.put::<P, T>(&path, patch).await },
            |s, item: &T| s.update_fulfilled(item.clone()),
        )
        .await
    }

    pub async fn delete(&self, id: &Id<T::Marker>) -> Settled<()> {
        let path = self.item_path(id);
        let gateway = Arc::clone(&self.ctx.gateway);
        let target = id.clone();
        self.mutate(
            "delete",
            serde_json::json!({ "id": id.as_str() }),
            Some(self.item_key(id)),
            async move { gateway.delete(&path).await },
            move |s, _: &()| s.delete_fulfilled(&target),
        )
        .await
    }

    // --- building blocks for domain stores ---

    pub(crate) async fn create_at<B: Serialize + Sync>(
        &self,
        action: &str,
        path: &str,
        body: &B,
    ) -> Settled<T> {
        let gateway = Arc::clone(&self.ctx.gateway);
        self.mutate(
            action,
            args(body),
            None,
            async move { gateway.post::<B, T>(path, body).await },
            |s, item: &T| s.create_fulfilled(item.clone()),
        )
        .await
    }

    /// Fetch lifecycle around `GET path`; a fulfilled result replaces the collection.
    pub(crate) async fn fetch_list(
        &self,
        action: &str,
        args: serde_json::Value,
        path: String,
    ) -> Settled<Vec<T>> {
        let op = self.begin(action, args, Some(self.list_key()));
        self.container.update(ContainerState::fetch_pending);
        let guard = InFlight::new(&self.container, Phase::Fetch);

        let result = self.ctx.gateway.get::<Vec<T>>(&path).await;
        let settled = op.settle(result, &format!("failed to {action} {}", T::PLURAL));
        guard.disarm();

        self.container.update(|s| match &settled {
            Settled::Fulfilled(items) => s.fetch_fulfilled(items.clone()),
            Settled::Rejected(err) => s.fetch_rejected(err.clone()),
            Settled::Superseded => s.fetch_settled(),
        });
        settled
    }

    /// Mutation lifecycle around `request`; `reduce` runs only on a
    /// non-superseded success.
    pub(crate) async fn mutate<R, Fut>(
        &self,
        action: &str,
        args: serde_json::Value,
        key: Option<String>,
        request: Fut,
        reduce: impl FnOnce(&mut ContainerState<T>, &R),
    ) -> Settled<R>
    where
        R: Serialize,
        Fut: Future<Output = Result<R, GatewayError>>,
    {
        let op = self.begin(action, args, key);
        self.container.update(ContainerState::mutation_pending);
        let guard = InFlight::new(&self.container, Phase::Mutation);

        let result = request.await;
        let settled = op.settle(result, &format!("failed to {action} {}", T::NOUN));
        guard.disarm();

        self.container.update(|s| match &settled {
            Settled::Fulfilled(value) => reduce(s, value),
            Settled::Rejected(err) => s.mutation_rejected(err.clone()),
            Settled::Superseded => s.mutation_settled(),
        });
        settled
    }

    /// Status poll: no in-flight flag, failures still land in `error`.
    pub(crate) async fn poll<R, Fut>(
        &self,
        action: &str,
        id: &Id<T::Marker>,
        request: Fut,
        reduce: impl FnOnce(&mut ContainerState<T>, &R),
    ) -> Settled<R>
    where
        R: Serialize,
        Fut: Future<Output = Result<R, GatewayError>>,
    {
        let op = self.begin(
            action,
            serde_json::json!({ "id": id.as_str() }),
            Some(format!("{}/{action}:{id}", T::DOMAIN)),
        );
        let result = request.await;
        let settled = op.settle(result, &format!("failed to {action} {}", T::NOUN));

        self.container.update(|s| match &settled {
            Settled::Fulfilled(value) => reduce(s, value),
            Settled::Rejected(err) => s.record_failure(err.clone()),
            Settled::Superseded => {}
        });
        settled
    }

    /// Track `id` in the progress bridge and poll it until it settles.
    pub(crate) fn watch_job<R, F, Fut>(
        &self,
        id: &Id<T::Marker>,
        title: String,
        mut refresh: F,
    ) -> JobHandle
    where
        R: Pollable + Send + 'static,
        F: FnMut(Id<T::Marker>) -> Fut + Send + 'static,
        Fut: Future<Output = Settled<R>> + Send + 'static,
    {
        let op_id: OperationId = generate(self.ctx.dispatcher.ids().as_ref());
        let target: Arc<dyn ProgressTarget> = Arc::new(self.container.clone());
        self.ctx
            .progress
            .track(op_id.clone(), title, Some(id.to_string()), target);

        let id = id.clone();
        spawn_watcher(
            Arc::clone(&self.ctx.progress),
            op_id,
            self.ctx.poll_interval,
            move || refresh(id.clone()),
        )
    }

    pub(crate) fn begin(
        &self,
        action: &str,
        args: serde_json::Value,
        key: Option<String>,
    ) -> crate::app::dispatcher::PendingOperation {
        self.ctx
            .dispatcher
            .begin(OperationName::new(T::DOMAIN, action), args, key)
    }

    pub(crate) fn item_path(&self, id: &Id<T::Marker>) -> String {
        gateway::item_path(T::PATH, id.as_str())
    }

    pub(crate) fn item_key(&self, id: &Id<T::Marker>) -> String {
        format!("{}/item:{id}", T::DOMAIN)
    }

    pub(crate) fn list_key(&self) -> String {
        format!("{}/list", T::DOMAIN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Fetch,
    Mutation,
}

/// Returns the container to idle when an operation future is dropped
/// between its pending and terminal reducers.
pub(crate) struct InFlight<T: Item> {
    container: Container<T>,
    phase: Phase,
    placeholder: Option<Id<T::Marker>>,
    job: Option<(Arc<ProgressBridge>, OperationId)>,
    armed: bool,
}

impl<T: Item> InFlight<T> {
    pub(crate) fn new(container: &Container<T>, phase: Phase) -> Self {
        Self {
            container: container.clone(),
            phase,
            placeholder: None,
            job: None,
            armed: true,
        }
    }

    /// Local pending item to discard on cancellation.
    pub(crate) fn placeholder(mut self, local_id: Id<T::Marker>) -> Self {
        self.placeholder = Some(local_id);
        self
    }

    /// Tracked job to cancel on cancellation.
    pub(crate) fn job(mut self, progress: Arc<ProgressBridge>, id: OperationId) -> Self {
        self.job = Some((progress, id));
        self
    }

    /// The operation settled; the caller applies the terminal reducer itself.
    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl<T: Item> Drop for InFlight<T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::debug!(phase = ?self.phase, "operation dropped before settling");
        let placeholder = self.placeholder.as_ref();
        let phase = self.phase;
        self.container.update(|s| {
            if let Some(local_id) = placeholder {
                s.discard_pending(local_id);
            }
            match phase {
                Phase::Fetch => s.fetch_settled(),
                Phase::Mutation => s.mutation_settled(),
            }
        });
        if let Some((progress, id)) = &self.job {
            progress.cancel(id);
        }
    }
}

/// Argument payload for an envelope.
pub(crate) fn args<A: Serialize + ?Sized>(value: &A) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
