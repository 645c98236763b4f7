//! AssetStore - アセットライブラリ
//!
//! 汎用 4 操作に加えて、検索・アップロード（2 相の楽観的挿入）・一括操作・
//! フォルダを扱う。

use std::ops::Deref;
use std::sync::{Arc, Mutex};

use crate::app::dispatcher::Settled;
use crate::app::gateway::with_query;
use crate::app::progress::ProgressTarget;
use crate::domain::{Asset, AssetId, FilterDescriptor, FilterPatch, Folder, UploadForm};
use crate::ports::ProgressFn;
use crate::ports::id_generator::generate;
use crate::store::container::ContainerState;
use crate::store::resource::{InFlight, Phase, Resource, ResourceStore, StoreContext, args};

pub const ASSET_DIMENSIONS: &[&str] = &["fileFormat", "status", "propertyType", "folder", "tag"];

impl Resource for Asset {
    const DOMAIN: &'static str = "assets";
    const PATH: &'static str = "/assets";
    const NOUN: &'static str = "asset";
    const PLURAL: &'static str = "assets";

    fn default_filters() -> FilterDescriptor {
        FilterDescriptor::all_of(ASSET_DIMENSIONS)
    }
}

#[derive(Clone)]
pub struct AssetStore {
    inner: ResourceStore<Asset>,
    folders: Arc<Mutex<Vec<Folder>>>,
}

impl Deref for AssetStore {
    type Target = ResourceStore<Asset>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AssetStore {
    pub fn new(ctx: Arc<StoreContext>) -> Self {
        Self {
            inner: ResourceStore::new(ctx),
            folders: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Weak-reference resolution for other containers.
    pub fn lookup(&self, id: &AssetId) -> Option<Asset> {
        self.inner.get(id)
    }

    /// Resolves every id that still exists, in the given order.
    pub fn lookup_many(&self, ids: &[AssetId]) -> Vec<Asset> {
        self.inner
            .read(|s| ids.iter().filter_map(|id| s.get(id).cloned()).collect())
    }

    pub fn folders(&self) -> Vec<Folder> {
        self.lock_folders().clone()
    }

    fn lock_folders(&self) -> std::sync::MutexGuard<'_, Vec<Folder>> {
        self.folders
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Server-side search; the query is also kept in the filters so the
    /// projection agrees with the result.
    pub async fn search(&self, query: &str) -> Settled<Vec<Asset>> {
        self.inner.set_filters(&FilterPatch::new().query(query));
        let path = with_query(
            "/assets/search",
            &[("q".to_string(), query.trim().to_string())],
        );
        self.inner
            .fetch_list("search", serde_json::json!({ "q": query }), path)
            .await
    }

    /// Two-phase upload: a local pending item is shown first and replaced by
    /// the server's item on success, or removed on failure.
    pub async fn upload(&self, form: UploadForm) -> Settled<Asset> {
        let ctx = self.inner.context();
        let container = self.inner.container().clone();
        let local: AssetId = generate(ctx.dispatcher.ids().as_ref());
        let placeholder = Asset::pending_upload(local.clone(), &form, ctx.dispatcher.clock().now());

        let op = self.inner.begin(
            "upload",
            serde_json::json!({
                "localId": local.as_str(),
                "fileName": form.file_name,
                "size": form.bytes.len(),
            }),
            None,
        );
        container.update(|s| {
            s.mutation_pending();
            s.insert_pending(placeholder);
        });

        let op_id = op.id().clone();
        let target: Arc<dyn ProgressTarget> = Arc::new(container.clone());
        ctx.progress.track(
            op_id.clone(),
            format!("Upload {}", form.file_name),
            Some(local.to_string()),
            target,
        );
        let guard = InFlight::new(&container, Phase::Mutation)
            .placeholder(local.clone())
            .job(Arc::clone(&ctx.progress), op_id.clone());
        let bridge = Arc::clone(&ctx.progress);
        let progress_id = op_id.clone();
        let on_progress: ProgressFn = Arc::new(move |sent, total| {
            bridge.on_progress(&progress_id, percent_of(sent, total));
        });

        let file_name = form.file_name.clone();
        let result = ctx
            .gateway
            .upload::<Asset>(Asset::PATH, form, Some(on_progress))
            .await;
        let settled = op.settle(result, "failed to upload asset");
        guard.disarm();

        match &settled {
            Settled::Fulfilled(asset) => {
                container.update(|s| {
                    s.confirm_pending(&local, asset.clone());
                    s.mutation_settled();
                });
                ctx.progress.complete_with_ref(
                    &op_id,
                    format!("{file_name} is in the library"),
                    Some(asset.id.to_string()),
                );
            }
            Settled::Rejected(err) => {
                container.update(|s| {
                    s.discard_pending(&local);
                    s.mutation_rejected(err.clone());
                });
                ctx.progress.fail(&op_id, err.message.clone());
            }
            Settled::Superseded => {
                container.update(|s| {
                    s.discard_pending(&local);
                    s.mutation_settled();
                });
                ctx.progress.cancel(&op_id);
            }
        }
        settled
    }

    pub async fn bulk_delete(&self, ids: &[AssetId]) -> Settled<()> {
        let gateway = Arc::clone(&self.inner.context().gateway);
        let body = serde_json::json!({ "ids": args(ids) });
        let targets = ids.to_vec();
        self.inner
            .mutate(
                "bulk_delete",
                body.clone(),
                None,
                async move {
                    gateway
                        .post::<_, serde_json::Value>("/assets/bulk/delete", &body)
                        .await
                        .map(|_| ())
                },
                move |s: &mut ContainerState<Asset>, _: &()| s.delete_many_fulfilled(&targets),
            )
            .await
    }

    /// Server returns the re-tagged assets; each replaces its entry by id.
    pub async fn bulk_tag(&self, ids: &[AssetId], tags: &[String]) -> Settled<Vec<Asset>> {
        let gateway = Arc::clone(&self.inner.context().gateway);
        let body = serde_json::json!({ "ids": args(ids), "tags": tags });
        self.inner
            .mutate(
                "bulk_tag",
                body.clone(),
                None,
                async move { gateway.post::<_, Vec<Asset>>("/assets/bulk/tags", &body).await },
                |s: &mut ContainerState<Asset>, assets: &Vec<Asset>| {
                    s.update_many_fulfilled(assets.clone())
                },
            )
            .await
    }

    pub async fn fetch_folders(&self) -> Settled<Vec<Folder>> {
        let container = self.inner.container().clone();
        let op = self.inner.begin("fetch_folders", serde_json::Value::Null, None);
        container.update(ContainerState::fetch_pending);
        let guard = InFlight::new(&container, Phase::Fetch);

        let result = self
            .inner
            .context()
            .gateway
            .get::<Vec<Folder>>("/assets/folders")
            .await;
        let settled = op.settle(result, "failed to fetch folders");
        guard.disarm();

        match &settled {
            Settled::Fulfilled(folders) => {
                *self.lock_folders() = folders.clone();
                container.update(ContainerState::fetch_settled);
            }
            Settled::Rejected(err) => container.update(|s| s.fetch_rejected(err.clone())),
            Settled::Superseded => container.update(ContainerState::fetch_settled),
        }
        settled
    }

    pub async fn create_folder(&self, name: &str) -> Settled<Folder> {
        let gateway = Arc::clone(&self.inner.context().gateway);
        let body = serde_json::json!({ "name": name });
        let settled = self
            .inner
            .mutate(
                "create_folder",
                body.clone(),
                None,
                async move { gateway.post::<_, Folder>("/assets/folders", &body).await },
                |s: &mut ContainerState<Asset>, _: &Folder| s.mutation_settled(),
            )
            .await;

        if let Settled::Fulfilled(folder) = &settled {
            let mut folders = self.lock_folders();
            match folders.iter_mut().find(|f| f.name == folder.name) {
                Some(existing) => *existing = folder.clone(),
                None => folders.push(folder.clone()),
            }
        }
        settled
    }
}

/// Byte counts to a clamped percentage; an empty body counts as done.
fn percent_of(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (sent.saturating_mul(100) / total).min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, 100)]
    #[case(0, 200, 0)]
    #[case(50, 200, 25)]
    #[case(200, 200, 100)]
    #[case(500, 200, 100)]
    fn byte_counts_become_clamped_percentages(#[case] sent: u64, #[case] total: u64, #[case] expected: u8) {
        assert_eq!(percent_of(sent, total), expected);
    }

    #[test]
    fn default_filters_cover_every_dimension() {
        let filters = Asset::default_filters();
        for dimension in ASSET_DIMENSIONS {
            assert!(filters.get(dimension).is_some_and(|v| v.is_all()));
        }
        assert_eq!(filters.query(), "");
    }
}
