//! Store - ドメインごとの状態コンテナと導出ビュー
//!
//! - **container**: 汎用の状態と reducer
//! - **projection**: フィルタ・ソートによる表示用の導出
//! - **resource**: fetch / create / update / delete の共通実装
//! - **assets / staging / videos / social**: ドメイン固有の操作
//! - **ui**: モーダル・トースト・通知フィード

pub mod assets;
pub mod container;
pub mod projection;
pub mod resource;
pub mod social;
pub mod staging;
pub mod ui;
pub mod videos;

pub use self::assets::AssetStore;
pub use self::container::{Container, ContainerState};
pub use self::projection::{matches, project, project_sorted};
pub use self::resource::{Resource, ResourceStore, StoreContext};
pub use self::social::SocialStore;
pub use self::staging::StagingStore;
pub use self::ui::{Toast, UiState, UiStore};
pub use self::videos::VideoStore;
