//! Filter descriptor - 名前付きフィルタ次元 + フリーテキストクエリ
//!
//! 各次元は `"all"` か具体的な値。適用は全述語の AND（順序非依存）。

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const ALL: &str = "all";

/// One filter dimension value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterValue {
    All,
    Value(String),
}

impl FilterValue {
    pub fn value(v: impl Into<String>) -> Self {
        let v = v.into();
        if v == ALL { FilterValue::All } else { FilterValue::Value(v) }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, FilterValue::All)
    }

    pub fn as_str(&self) -> &str {
        match self {
            FilterValue::All => ALL,
            FilterValue::Value(v) => v,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FilterValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FilterValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(FilterValue::value(s))
    }
}

/// Immutable record of filter dimensions plus a free-text query.
///
/// Mutation goes through `merged()` / container reducers, which return a new
/// descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    #[serde(default)]
    dimensions: BTreeMap<String, FilterValue>,
    #[serde(default)]
    query: String,
}

impl FilterDescriptor {
    /// Descriptor where every named dimension is `"all"` and the query is empty.
    pub fn all_of(dimensions: &[&str]) -> Self {
        Self {
            dimensions: dimensions
                .iter()
                .map(|d| (d.to_string(), FilterValue::All))
                .collect(),
            query: String::new(),
        }
    }

    pub fn with(mut self, dimension: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions
            .insert(dimension.into(), FilterValue::value(value));
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn dimensions(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.dimensions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, dimension: &str) -> Option<&FilterValue> {
        self.dimensions.get(dimension)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// New descriptor with only the keys present in `patch` overwritten.
    pub fn merged(&self, patch: &FilterPatch) -> Self {
        let mut next = self.clone();
        for (dimension, value) in &patch.dimensions {
            next.dimensions.insert(dimension.clone(), value.clone());
        }
        if let Some(query) = &patch.query {
            next.query = query.clone();
        }
        next
    }

    /// Query parameters for a server-side fetch (non-"all" dimensions and a
    /// non-empty query only).
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .dimensions
            .iter()
            .filter(|(_, v)| !v.is_all())
            .map(|(k, v)| (k.clone(), v.as_str().to_string()))
            .collect();
        let query = self.query.trim();
        if !query.is_empty() {
            pairs.push(("q".to_string(), query.to_string()));
        }
        pairs
    }
}

/// Partial update for `set_filters`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPatch {
    #[serde(default)]
    pub dimensions: BTreeMap<String, FilterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl FilterPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, dimension: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions
            .insert(dimension.into(), FilterValue::value(value));
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

/// Explicit sort request for projections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}
