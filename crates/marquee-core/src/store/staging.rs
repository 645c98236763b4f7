//! StagingStore - バーチャルステージング（部屋の AI 合成）ジョブ

use std::ops::Deref;
use std::sync::Arc;

use crate::app::dispatcher::Settled;
use crate::app::gateway::item_path;
use crate::app::progress::{JobHandle, PollStatus, Pollable};
use crate::domain::{
    FilterDescriptor, StagingJob, StagingJobId, StagingRequest, StagingStatus, StagingStatusReport,
};
use crate::store::container::ContainerState;
use crate::store::resource::{Resource, ResourceStore, StoreContext};

pub const STAGING_DIMENSIONS: &[&str] = &["status", "roomType", "style", "tag"];

impl Resource for StagingJob {
    const DOMAIN: &'static str = "staging";
    const PATH: &'static str = "/staging/projects";
    const CREATE_PATH: &'static str = "/staging/generate";
    const NOUN: &'static str = "staging job";
    const PLURAL: &'static str = "staging jobs";

    fn default_filters() -> FilterDescriptor {
        FilterDescriptor::all_of(STAGING_DIMENSIONS)
    }
}

impl Pollable for StagingStatusReport {
    fn poll_status(&self) -> PollStatus {
        match self.status {
            StagingStatus::Queued | StagingStatus::Processing => PollStatus::Running(self.progress),
            StagingStatus::Completed => {
                PollStatus::Completed(format!("{} staged image(s) ready", self.result_urls.len()))
            }
            StagingStatus::Failed => PollStatus::Failed(
                self.error
                    .clone()
                    .unwrap_or_else(|| "staging failed".to_string()),
            ),
        }
    }
}

#[derive(Clone)]
pub struct StagingStore {
    inner: ResourceStore<StagingJob>,
}

impl Deref for StagingStore {
    type Target = ResourceStore<StagingJob>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl StagingStore {
    pub fn new(ctx: Arc<StoreContext>) -> Self {
        Self {
            inner: ResourceStore::new(ctx),
        }
    }

    /// Submit a staging request; the queued job is prepended.
    pub async fn generate(&self, request: &StagingRequest) -> Settled<StagingJob> {
        self.inner
            .create_at("generate", StagingJob::CREATE_PATH, request)
            .await
    }

    /// One status poll, folded into the job if it is in the collection.
    pub async fn refresh_status(&self, id: &StagingJobId) -> Settled<StagingStatusReport> {
        let gateway = Arc::clone(&self.inner.context().gateway);
        let path = item_path("/staging/status", id.as_str());
        let target = id.clone();
        self.inner
            .poll(
                "refresh_status",
                id,
                async move { gateway.get::<StagingStatusReport>(&path).await },
                move |s: &mut ContainerState<StagingJob>, report: &StagingStatusReport| {
                    s.patch_item(&target, |job| job.apply_report(report));
                },
            )
            .await
    }

    /// Poll the job every poll interval until it completes, fails or the
    /// handle is cancelled.
    pub fn watch(&self, id: &StagingJobId) -> JobHandle {
        let title = self
            .inner
            .get(id)
            .map(|job| format!("Staging: {}", job.name))
            .unwrap_or_else(|| format!("Staging job {id}"));
        let store = self.clone();
        self.inner.watch_job(id, title, move |id| {
            let store = store.clone();
            async move { store.refresh_status(&id).await }
        })
    }
}
