//! The idempotent synchronization core.

pub mod conflict;
pub mod engine;
pub mod resolve;
pub mod retry;
pub mod run_manager;
pub mod signature;

pub use conflict::{ConflictDetectionOptions, ConflictDetector};
pub use engine::{SuccessPolicy, SyncEngine, SyncOptions, SyncReport};
pub use resolve::{ApplyOutcome, ConflictResolver, ResolutionOptions};
pub use retry::{
    classify, BreakerConfig, CircuitBreakerMetrics, CircuitState, ClassifiedError, ErrorKind,
    RetryConfig, RetryConfigPatch, RetryExecutor, RetryFailure, Severity,
};
pub use run_manager::{ProductOutcome, SyncRunManager};
pub use signature::{
    compute_product_signatures, has_product_changed, ChangeReport, ProductSignatures,
    StoredSignatures,
};

/// Per-field-group toggles for what a sync is allowed to overwrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldToggles {
    pub images: bool,
    pub inventory: bool,
    pub pricing: bool,
    pub tags: bool,
    pub variants: bool,
    pub descriptions: bool,
}

impl Default for FieldToggles {
    fn default() -> Self {
        Self {
            images: true,
            inventory: true,
            pricing: true,
            tags: true,
            variants: true,
            descriptions: true,
        }
    }
}
