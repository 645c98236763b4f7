//! Social scheduling entities.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AssetId, Post as PostMarker, PostId};
use super::item::{Item, ItemMeta, SortValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Instagram,
    Facebook,
    Linkedin,
    Twitter,
    Tiktok,
    Youtube,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Linkedin => "linkedin",
            Platform::Twitter => "twitter",
            Platform::Tiktok => "tiktok",
            Platform::Youtube => "youtube",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
    Failed,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Scheduled => "scheduled",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialPost {
    pub id: PostId,
    pub content: String,
    pub platforms: Vec<Platform>,
    pub status: PostStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,

    /// Attached media, by id only. Resolve against the asset container.
    #[serde(default)]
    pub asset_ids: Vec<AssetId>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(flatten)]
    pub meta: ItemMeta,
}

impl Item for SocialPost {
    type Marker = PostMarker;

    fn id(&self) -> &PostId {
        &self.id
    }

    fn set_id(&mut self, id: PostId) {
        self.id = id;
    }

    fn dimension_values(&self, dimension: &str) -> Vec<Cow<'_, str>> {
        match dimension {
            "status" => vec![Cow::Borrowed(self.status.as_str())],
            "platform" => self
                .platforms
                .iter()
                .map(|p| Cow::Borrowed(p.as_str()))
                .collect(),
            "tag" => self.meta.tags.iter().map(|t| Cow::Borrowed(t.as_str())).collect(),
            _ => Vec::new(),
        }
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.content.as_str()];
        fields.extend(self.meta.tags.iter().map(String::as_str));
        fields.extend(self.platforms.iter().map(|p| p.as_str()));
        fields
    }

    fn sort_value(&self, field: &str) -> Option<SortValue> {
        match field {
            "scheduledAt" => self.scheduled_at.map(SortValue::Time),
            "createdAt" => Some(SortValue::Time(self.created_at)),
            "updatedAt" => Some(SortValue::Time(self.updated_at)),
            _ => None,
        }
    }
}

/// Connection state of one social platform (`GET /social/platforms`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConnection {
    pub platform: Platform,
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_platform_post_exposes_every_platform() {
        let json = r#"{
            "id": "p1",
            "content": "Just listed!",
            "platforms": ["instagram", "facebook"],
            "status": "scheduled",
            "scheduledAt": "2024-05-01T15:00:00Z",
            "assetIds": ["a1"],
            "createdAt": "2024-04-01T00:00:00Z",
            "updatedAt": "2024-04-01T00:00:00Z",
            "tags": ["justlisted"]
        }"#;
        let post: SocialPost = serde_json::from_str(json).unwrap();
        assert_eq!(post.dimension_values("platform"), vec!["instagram", "facebook"]);
        assert_eq!(post.asset_ids, vec![AssetId::new("a1")]);
        assert!(post.search_fields().contains(&"justlisted"));
    }

    #[test]
    fn unscheduled_post_has_no_schedule_sort_value() {
        let json = r#"{
            "id": "p2", "content": "draft", "platforms": [], "status": "draft",
            "createdAt": "2024-04-01T00:00:00Z", "updatedAt": "2024-04-01T00:00:00Z"
        }"#;
        let post: SocialPost = serde_json::from_str(json).unwrap();
        assert!(post.sort_value("scheduledAt").is_none());
    }
}
