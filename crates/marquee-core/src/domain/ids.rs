//! Domain identifiers (strongly-typed IDs).
//!
//! # Phantom type による ID
//! サーバーが払い出す ID（文字列）をそのまま保持しつつ、
//! `Id<T>` のマーカー型でコンパイル時に種類を区別します。
//!
//! - サーバー由来の ID: `Id::new("a-123")` でそのまま受け入れる
//! - ローカル生成の ID（operation / 楽観的 pending item / notification）:
//!   `IdGenerator` が ULID + プレフィックスで生成する

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// ローカル生成時に使うプレフィックス（"op-", "local-" など）を提供します。
/// `ContainerState<T>` の derive は `T::Marker` にも Clone / Debug / PartialEq を要求する。
pub trait IdMarker: fmt::Debug + Clone + PartialEq + Send + Sync + 'static {
    /// ローカル生成 ID のプレフィックス
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// # 例
/// ```ignore
/// let asset: AssetId = Id::new("asset-1");
/// let post: PostId = Id::new("asset-1");
/// // asset と post は異なる型なので、混同できない
/// ```
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// 既存の ID 文字列（サーバー由来など）から作成
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    /// ULID からローカル ID を作成（プレフィックス付き）
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self::new(format!("{}{}", T::prefix(), ulid))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// ローカル生成された ID かどうか（サーバー未確定の pending item 判定に使う）
    pub fn is_local(&self) -> bool {
        self.value.starts_with(T::prefix())
    }
}

// derive だと T にも bound が付いてしまうので手書きする
impl<T: IdMarker> Clone for Id<T> {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl<T: IdMarker> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: IdMarker> Eq for Id<T> {}

impl<T: IdMarker> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T: IdMarker> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: IdMarker> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T: IdMarker> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

impl<T: IdMarker> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> From<String> for Id<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ========================================
// マーカー型の定義
// ========================================

macro_rules! id_marker {
    ($(#[$doc:meta])* $marker:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(
    /// Asset のマーカー型（楽観的アップロード中は "local-asset-"）
    Asset,
    "local-asset-"
);
id_marker!(StagingJob, "local-staging-");
id_marker!(VideoJob, "local-video-");
id_marker!(Post, "local-post-");
id_marker!(
    /// Operation Envelope のマーカー型
    Operation,
    "op-"
);
id_marker!(Notification, "ntf-");

// ========================================
// Type Alias
// ========================================

pub type AssetId = Id<Asset>;
pub type StagingJobId = Id<StagingJob>;
pub type VideoJobId = Id<VideoJob>;
pub type PostId = Id<Post>;

/// Identifier of one dispatched operation (one pending → terminal lifecycle).
pub type OperationId = Id<Operation>;

pub type NotificationId = Id<Notification>;
