//! VideoStore - 動画生成ジョブ

use std::ops::Deref;
use std::sync::Arc;

use crate::app::dispatcher::Settled;
use crate::app::gateway::item_path;
use crate::app::progress::{JobHandle, PollStatus, Pollable};
use crate::domain::{FilterDescriptor, VideoJob, VideoJobId, VideoStatus, VideoStatusReport};
use crate::store::container::ContainerState;
use crate::store::resource::{Resource, ResourceStore, StoreContext};

pub const VIDEO_DIMENSIONS: &[&str] = &["status", "template", "aspectRatio", "tag"];

impl Resource for VideoJob {
    const DOMAIN: &'static str = "videos";
    const PATH: &'static str = "/videos";
    const NOUN: &'static str = "video";
    const PLURAL: &'static str = "videos";

    fn default_filters() -> FilterDescriptor {
        FilterDescriptor::all_of(VIDEO_DIMENSIONS)
    }
}

impl Pollable for VideoStatusReport {
    fn poll_status(&self) -> PollStatus {
        match self.status {
            VideoStatus::Draft | VideoStatus::Queued | VideoStatus::Generating => {
                PollStatus::Running(self.progress)
            }
            VideoStatus::Completed => PollStatus::Completed(match &self.output_url {
                Some(url) => format!("video ready at {url}"),
                None => "video ready".to_string(),
            }),
            VideoStatus::Failed => PollStatus::Failed(
                self.error
                    .clone()
                    .unwrap_or_else(|| "video generation failed".to_string()),
            ),
        }
    }
}

#[derive(Clone)]
pub struct VideoStore {
    inner: ResourceStore<VideoJob>,
}

impl Deref for VideoStore {
    type Target = ResourceStore<VideoJob>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl VideoStore {
    pub fn new(ctx: Arc<StoreContext>) -> Self {
        Self {
            inner: ResourceStore::new(ctx),
        }
    }

    /// Start rendering a draft; the returned job replaces the draft.
    pub async fn generate(&self, id: &VideoJobId) -> Settled<VideoJob> {
        let gateway = Arc::clone(&self.inner.context().gateway);
        let path = format!("{}/generate", self.inner.item_path(id));
        self.inner
            .mutate(
                "generate",
                serde_json::json!({ "id": id.as_str() }),
                Some(self.inner.item_key(id)),
                async move {
                    gateway
                        .post::<_, VideoJob>(&path, &serde_json::json!({}))
                        .await
                },
                |s: &mut ContainerState<VideoJob>, job: &VideoJob| s.update_fulfilled(job.clone()),
            )
            .await
    }

    pub async fn refresh_status(&self, id: &VideoJobId) -> Settled<VideoStatusReport> {
        let gateway = Arc::clone(&self.inner.context().gateway);
        let path = format!("{}/status", item_path(VideoJob::PATH, id.as_str()));
        let target = id.clone();
        self.inner
            .poll(
                "refresh_status",
                id,
                async move { gateway.get::<VideoStatusReport>(&path).await },
                move |s: &mut ContainerState<VideoJob>, report: &VideoStatusReport| {
                    s.patch_item(&target, |job| job.apply_report(report));
                },
            )
            .await
    }

    pub fn watch(&self, id: &VideoJobId) -> JobHandle {
        let title = self
            .inner
            .get(id)
            .map(|job| format!("Video: {}", job.title))
            .unwrap_or_else(|| format!("Video {id}"));
        let store = self.clone();
        self.inner.watch_job(id, title, move |id| {
            let store = store.clone();
            async move { store.refresh_status(&id).await }
        })
    }
}
