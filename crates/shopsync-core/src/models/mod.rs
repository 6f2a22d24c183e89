//! Data models for shopsync

mod conflict;
mod product;
mod remote;
mod review;
mod sync_event;
mod sync_run;
mod vendor;

pub use conflict::{
    ConflictDetectionResult, ConflictMetadata, ConflictType, ResolutionAction, ResolutionResult,
    ResolutionStrategy, VendorPriority,
};
pub use product::{Product, ProductId, ProductImage, ProductStatus, ProductUpdate, ProductVariant};
pub use remote::{InventoryItem, RemoteImage, RemotePage, RemoteProduct, RemoteVariant};
pub use review::{ManualReviewItem, ReviewDecision, ReviewId, ReviewStatus};
pub use sync_event::{EventId, ProductSyncEvent, SyncEventType, SyncOperation};
pub use sync_run::{RunId, StartRunParams, SyncDirection, SyncRun, SyncRunStatus};
pub use vendor::Vendor;
