//! Virtual staging jobs (AI-staged room mockups).

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AssetId, StagingJob as StagingJobMarker, StagingJobId};
use super::item::{Item, ItemMeta, SortValue};

/// StagingStatus はジョブの状態
///
/// # 状態遷移
/// - queued → processing → completed
/// - queued → processing → failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl StagingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StagingStatus::Queued => "queued",
            StagingStatus::Processing => "processing",
            StagingStatus::Completed => "completed",
            StagingStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StagingStatus::Completed | StagingStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingJob {
    pub id: StagingJobId,
    pub name: String,
    pub status: StagingStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    pub room_type: String,
    pub style: String,

    /// Weak reference into the asset container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_asset_id: Option<AssetId>,

    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub result_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(flatten)]
    pub meta: ItemMeta,
}

impl StagingJob {
    /// Fold a status poll into the job.
    pub fn apply_report(&mut self, report: &StagingStatusReport) {
        self.status = report.status;
        self.progress = report.progress.min(100);
        if !report.result_urls.is_empty() {
            self.result_urls = report.result_urls.clone();
        }
        self.error = report.error.clone();
    }
}

impl Item for StagingJob {
    type Marker = StagingJobMarker;

    fn id(&self) -> &StagingJobId {
        &self.id
    }

    fn set_id(&mut self, id: StagingJobId) {
        self.id = id;
    }

    fn dimension_values(&self, dimension: &str) -> Vec<Cow<'_, str>> {
        match dimension {
            "status" => vec![Cow::Borrowed(self.status.as_str())],
            "roomType" => vec![Cow::Borrowed(self.room_type.as_str())],
            "style" => vec![Cow::Borrowed(self.style.as_str())],
            "property" => self.property.as_deref().map(Cow::Borrowed).into_iter().collect(),
            "tag" => self.meta.tags.iter().map(|t| Cow::Borrowed(t.as_str())).collect(),
            _ => Vec::new(),
        }
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str(), self.room_type.as_str()];
        fields.extend(self.meta.tags.iter().map(String::as_str));
        if let Some(property) = &self.property {
            fields.push(property);
        }
        fields
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "name" => Some(SortValue::Text(self.name.clone())),
            "progress" => Some(SortValue::Number(f64::from(self.progress))),
            "createdAt" => Some(SortValue::Time(self.created_at)),
            "updatedAt" => Some(SortValue::Time(self.updated_at)),
            _ => None,
        }
    }

    fn apply_progress(&mut self, percent: u8) {
        self.progress = percent;
        if self.status == StagingStatus::Queued {
            self.status = StagingStatus::Processing;
        }
    }
}

/// Body of `POST /staging/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingRequest {
    pub name: String,
    pub source_asset_id: AssetId,
    pub room_type: String,
    pub style: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

/// Response of `GET /staging/status/{jobId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingStatusReport {
    pub status: StagingStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub result_urls: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn job() -> StagingJob {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        StagingJob {
            id: StagingJobId::new("s1"),
            name: "Living room refresh".into(),
            status: StagingStatus::Queued,
            property: Some("12 Oak St".into()),
            room_type: "living_room".into(),
            style: "modern".into(),
            source_asset_id: Some(AssetId::new("a1")),
            progress: 0,
            result_urls: vec![],
            error: None,
            created_at: at,
            updated_at: at,
            meta: ItemMeta::default(),
        }
    }

    #[test]
    fn progress_moves_queued_job_to_processing() {
        let mut j = job();
        j.apply_progress(30);
        assert_eq!(j.progress, 30);
        assert_eq!(j.status, StagingStatus::Processing);
    }

    #[test]
    fn status_report_is_folded_in() {
        let mut j = job();
        j.apply_report(&StagingStatusReport {
            status: StagingStatus::Completed,
            progress: 140,
            result_urls: vec!["https://cdn.example.com/s1/0.jpg".into()],
            error: None,
        });
        assert_eq!(j.status, StagingStatus::Completed);
        assert_eq!(j.progress, 100);
        assert_eq!(j.result_urls.len(), 1);
    }

    #[test]
    fn terminal_statuses() {
        assert!(StagingStatus::Completed.is_terminal());
        assert!(StagingStatus::Failed.is_terminal());
        assert!(!StagingStatus::Processing.is_terminal());
    }

    #[test]
    fn room_type_is_searchable() {
        let j = job();
        assert!(j.search_fields().contains(&"living_room"));
    }
}
