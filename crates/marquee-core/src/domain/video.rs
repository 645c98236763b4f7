//! Video generation jobs.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AssetId, VideoJob as VideoJobMarker, VideoJobId};
use super::item::{Item, ItemMeta, SortValue};

/// VideoStatus - draft は生成前の編集状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Draft,
    Queued,
    Generating,
    Completed,
    Failed,
}

impl VideoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VideoStatus::Draft => "draft",
            VideoStatus::Queued => "queued",
            VideoStatus::Generating => "generating",
            VideoStatus::Completed => "completed",
            VideoStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoJob {
    pub id: VideoJobId,
    pub title: String,
    pub template: String,
    pub status: VideoStatus,

    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,

    /// Source assets (weak references into the asset container).
    #[serde(default)]
    pub asset_ids: Vec<AssetId>,

    #[serde(default)]
    pub duration_secs: u32,
    #[serde(default)]
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(flatten)]
    pub meta: ItemMeta,
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

impl VideoJob {
    /// Fold a status poll into the job.
    pub fn apply_report(&mut self, report: &VideoStatusReport) {
        self.status = report.status;
        self.progress = report.progress.min(100);
        if report.output_url.is_some() {
            self.output_url = report.output_url.clone();
        }
    }
}

impl Item for VideoJob {
    type Marker = VideoJobMarker;

    fn id(&self) -> &VideoJobId {
        &self.id
    }

    fn set_id(&mut self, id: VideoJobId) {
        self.id = id;
    }

    fn dimension_values(&self, dimension: &str) -> Vec<Cow<'_, str>> {
        match dimension {
            "status" => vec![Cow::Borrowed(self.status.as_str())],
            "template" => vec![Cow::Borrowed(self.template.as_str())],
            "aspectRatio" => vec![Cow::Borrowed(self.aspect_ratio.as_str())],
            "tag" => self.meta.tags.iter().map(|t| Cow::Borrowed(t.as_str())).collect(),
            _ => Vec::new(),
        }
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str(), self.template.as_str()];
        fields.extend(self.meta.tags.iter().map(String::as_str));
        fields
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "title" | "name" => Some(SortValue::Text(self.title.clone())),
            "duration" => Some(SortValue::Number(f64::from(self.duration_secs))),
            "createdAt" => Some(SortValue::Time(self.created_at)),
            "updatedAt" => Some(SortValue::Time(self.updated_at)),
            _ => None,
        }
    }

    fn apply_progress(&mut self, percent: u8) {
        self.progress = percent;
        if matches!(self.status, VideoStatus::Draft | VideoStatus::Queued) {
            self.status = VideoStatus::Generating;
        }
    }
}

/// Response of `GET /videos/{id}/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatusReport {
    pub status: VideoStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub output_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
