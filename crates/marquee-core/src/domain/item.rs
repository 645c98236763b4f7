//! Item - コンテナが保持するエンティティの共通インターフェース
//!
//! Asset / StagingJob / VideoJob / SocialPost はすべて `Item` を実装し、
//! 汎用の state container と projection から同じ方法で扱われます。

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::ids::{Id, IdMarker};

/// Optional nested metadata shared by every item kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMeta {
    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Technical metadata (resolution, codec, camera, ...).
    #[serde(default)]
    pub technical: BTreeMap<String, String>,
}

impl ItemMeta {
    pub fn with_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            technical: BTreeMap::new(),
        }
    }
}

/// Comparable value extracted from an item for explicit sorting.
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Text(String),
    Number(f64),
    Time(DateTime<Utc>),
}

impl SortValue {
    /// Values of different variants never occur for one field; they compare equal.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Text(a), SortValue::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            (SortValue::Number(a), SortValue::Number(b)) => {
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (SortValue::Time(a), SortValue::Time(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// Item は state container に格納できるエンティティ
///
/// # 実装する側の責務
/// - `id()`: コンテナ内で一意
/// - `dimension_values()`: フィルタ次元名（"fileFormat", "tag" など）に対応する値。
///   多値の次元（tags, platforms）は複数返す。未知の次元は空。
/// - `search_fields()`: フリーテキスト検索の対象（name, tags, ドメイン固有の副フィールド）
pub trait Item: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    type Marker: IdMarker;

    fn id(&self) -> &Id<Self::Marker>;

    /// Replaces the identifier (used when a pending item is confirmed).
    fn set_id(&mut self, id: Id<Self::Marker>);

    fn dimension_values(&self, dimension: &str) -> Vec<Cow<'_, str>>;

    fn search_fields(&self) -> Vec<&str>;

    fn sort_value(&self, field: &str) -> Option<SortValue>;

    /// Per-item progress for long-running items. Most kinds have none.
    fn apply_progress(&mut self, _percent: u8) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn text_sort_values_compare_case_insensitively() {
        let a = SortValue::Text("apple".into());
        let b = SortValue::Text("Banana".into());
        assert_eq!(a.compare(&b), Ordering::Less);
    }

    #[test]
    fn time_sort_values_compare_chronologically() {
        let early = SortValue::Time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let late = SortValue::Time(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(early.compare(&late), Ordering::Less);
        assert_eq!(late.compare(&early), Ordering::Greater);
    }

    #[test]
    fn meta_defaults_when_missing_from_json() {
        let meta: ItemMeta = serde_json::from_str("{}").unwrap();
        assert!(meta.tags.is_empty());
        assert!(meta.technical.is_empty());
    }
}
