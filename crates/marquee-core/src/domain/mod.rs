//! Domain model (IDs, items, filters, envelopes, notifications, errors).

pub mod asset;
pub mod envelope;
pub mod errors;
pub mod filter;
pub mod ids;
pub mod item;
pub mod notification;
pub mod social;
pub mod staging;
pub mod video;

pub use asset::{Asset, AssetStatus, FileFormat, Folder, UploadForm};
pub use envelope::{OperationEnvelope, OperationName, Phase, Settlement};
pub use errors::{ErrorKind, ErrorPayload};
pub use filter::{FilterDescriptor, FilterPatch, FilterValue, SortDirection, SortKey};
pub use ids::{AssetId, Id, IdMarker, NotificationId, OperationId, PostId, StagingJobId, VideoJobId};
pub use item::{Item, ItemMeta, SortValue};
pub use notification::{Notification, NotificationFeed, NotificationKind, NotificationPayload};
pub use social::{Platform, PlatformConnection, PostStatus, SocialPost};
pub use staging::{StagingJob, StagingRequest, StagingStatus, StagingStatusReport};
pub use video::{VideoJob, VideoStatus, VideoStatusReport};
