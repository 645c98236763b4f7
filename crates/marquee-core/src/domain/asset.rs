//! Asset library entities.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{Asset as AssetMarker, AssetId};
use super::item::{Item, ItemMeta, SortValue};

/// File format of an asset (the "fileFormat" filter dimension).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Image,
    Video,
    Document,
    Audio,
    Other,
}

impl FileFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            FileFormat::Image => "image",
            FileFormat::Video => "video",
            FileFormat::Document => "document",
            FileFormat::Audio => "audio",
            FileFormat::Other => "other",
        }
    }

    /// Guess from a MIME type such as `image/jpeg`.
    pub fn from_mime(mime: &str) -> Self {
        match mime.split('/').next().unwrap_or_default() {
            "image" => FileFormat::Image,
            "video" => FileFormat::Video,
            "audio" => FileFormat::Audio,
            "application" | "text" => FileFormat::Document,
            _ => FileFormat::Other,
        }
    }
}

/// Asset lifecycle.
///
/// - Uploading: 楽観的に挿入された pending item（サーバー未確定）
/// - Processing: サーバー側でサムネイル生成など
/// - Ready / Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Uploading,
    Processing,
    Ready,
    Failed,
}

impl AssetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetStatus::Uploading => "uploading",
            AssetStatus::Processing => "processing",
            AssetStatus::Ready => "ready",
            AssetStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    #[serde(rename = "type")]
    pub file_format: FileFormat,
    pub status: AssetStatus,

    /// Listing/property the asset belongs to (secondary search field).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,

    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,

    /// Upload progress while `status == Uploading`.
    #[serde(default)]
    pub progress: u8,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(flatten)]
    pub meta: ItemMeta,
}

impl Asset {
    /// Local placeholder shown while an upload is in flight.
    pub fn pending_upload(id: AssetId, form: &UploadForm, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: form.file_name.clone(),
            file_format: FileFormat::from_mime(&form.content_type),
            status: AssetStatus::Uploading,
            property: form.property.clone(),
            property_type: None,
            folder: form.folder.clone(),
            size_bytes: form.bytes.len() as u64,
            url: None,
            thumbnail_url: None,
            progress: 0,
            created_at: now,
            updated_at: now,
            meta: ItemMeta::with_tags(form.tags.iter().cloned()),
        }
    }
}

impl Item for Asset {
    type Marker = AssetMarker;

    fn id(&self) -> &AssetId {
        &self.id
    }

    fn set_id(&mut self, id: AssetId) {
        self.id = id;
    }

    fn dimension_values(&self, dimension: &str) -> Vec<Cow<'_, str>> {
        match dimension {
            "fileFormat" | "type" => vec![Cow::Borrowed(self.file_format.as_str())],
            "status" => vec![Cow::Borrowed(self.status.as_str())],
            "property" => self.property.as_deref().map(Cow::Borrowed).into_iter().collect(),
            "propertyType" => self
                .property_type
                .as_deref()
                .map(Cow::Borrowed)
                .into_iter()
                .collect(),
            "folder" => self.folder.as_deref().map(Cow::Borrowed).into_iter().collect(),
            "tag" => self.meta.tags.iter().map(|t| Cow::Borrowed(t.as_str())).collect(),
            _ => Vec::new(),
        }
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.meta.tags.iter().map(String::as_str));
        if let Some(property) = &self.property {
            fields.push(property);
        }
        fields
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "name" => Some(SortValue::Text(self.name.clone())),
            "size" => Some(SortValue::Number(self.size_bytes as f64)),
            "createdAt" => Some(SortValue::Time(self.created_at)),
            "updatedAt" => Some(SortValue::Time(self.updated_at)),
            "property" => self.property.clone().map(SortValue::Text),
            _ => None,
        }
    }

    fn apply_progress(&mut self, percent: u8) {
        self.progress = percent;
    }
}

/// Multipart upload payload (`file`, optional `property`, `tags`, `folder`).
#[derive(Debug, Clone, PartialEq)]
pub struct UploadForm {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub property: Option<String>,
    pub tags: Vec<String>,
    pub folder: Option<String>,
}

impl UploadForm {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
            property: None,
            tags: Vec::new(),
            folder: None,
        }
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    /// `tags` is sent as a JSON-encoded array field.
    pub fn tags_field(&self) -> String {
        serde_json::to_string(&self.tags).unwrap_or_else(|_| "[]".to_string())
    }
}

/// A folder in the asset library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub name: String,
    #[serde(default)]
    pub asset_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("image/jpeg", FileFormat::Image)]
    #[case("video/mp4", FileFormat::Video)]
    #[case("application/pdf", FileFormat::Document)]
    #[case("audio/mpeg", FileFormat::Audio)]
    #[case("weird", FileFormat::Other)]
    fn file_format_from_mime(#[case] mime: &str, #[case] expected: FileFormat) {
        assert_eq!(FileFormat::from_mime(mime), expected);
    }

    #[test]
    fn asset_decodes_from_wire_shape() {
        let json = r#"{
            "id": "a1",
            "name": "Kitchen.jpg",
            "type": "image",
            "status": "ready",
            "property": "12 Oak St",
            "propertyType": "luxury",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z",
            "tags": ["kitchen", "interior"],
            "technical": {"resolution": "4032x3024"}
        }"#;
        let asset: Asset = serde_json::from_str(json).unwrap();
        assert_eq!(asset.id.as_str(), "a1");
        assert_eq!(asset.file_format, FileFormat::Image);
        assert!(asset.meta.tags.contains("kitchen"));
        assert_eq!(asset.meta.technical["resolution"], "4032x3024");
        assert_eq!(asset.dimension_values("propertyType"), vec!["luxury"]);
    }

    #[test]
    fn upload_form_tags_are_json_encoded() {
        let form = UploadForm::new("a.jpg", "image/jpeg", vec![1, 2, 3]).with_tags(["a", "b"]);
        assert_eq!(form.tags_field(), r#"["a","b"]"#);
    }
}
