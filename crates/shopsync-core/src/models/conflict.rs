//! Conflict classification and resolution result types

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{Product, ProductUpdate, RemoteProduct};

/// How the local and remote copies of a product diverge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// No divergence requiring a decision
    None,
    /// Local version counter indicates local edits since creation
    VersionMismatch,
    ContentChange,
    VariantChange,
    ImageChange,
    /// Both sides modified since the last successful sync
    ConcurrentModification,
    LocalNewer,
    RemoteNewer,
}

impl ConflictType {
    /// Stable string form used in the database and event ledger
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::VersionMismatch => "version_mismatch",
            Self::ContentChange => "content_change",
            Self::VariantChange => "variant_change",
            Self::ImageChange => "image_change",
            Self::ConcurrentModification => "concurrent_modification",
            Self::LocalNewer => "local_newer",
            Self::RemoteNewer => "remote_newer",
        }
    }
}

impl FromStr for ConflictType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "version_mismatch" => Ok(Self::VersionMismatch),
            "content_change" => Ok(Self::ContentChange),
            "variant_change" => Ok(Self::VariantChange),
            "image_change" => Ok(Self::ImageChange),
            "concurrent_modification" => Ok(Self::ConcurrentModification),
            "local_newer" => Ok(Self::LocalNewer),
            "remote_newer" => Ok(Self::RemoteNewer),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown conflict type: {other}"
            ))),
        }
    }
}

/// How a detected conflict should be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    AcceptLocal,
    AcceptRemote,
    VendorPriority,
    TimestampBased,
    Merge,
    SkipSync,
    ManualReview,
}

impl ResolutionStrategy {
    /// Stable string form used in the database and event ledger
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AcceptLocal => "accept_local",
            Self::AcceptRemote => "accept_remote",
            Self::VendorPriority => "vendor_priority",
            Self::TimestampBased => "timestamp_based",
            Self::Merge => "merge",
            Self::SkipSync => "skip_sync",
            Self::ManualReview => "manual_review",
        }
    }
}

/// Which side a vendor-priority decision favors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorPriority {
    Local,
    Remote,
}

/// Timestamps and change details backing a classification decision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictMetadata {
    /// Local product's last modification (Unix ms)
    pub local_last_modified: Option<i64>,
    /// Remote product's last modification (Unix ms)
    pub remote_last_modified: Option<i64>,
    pub sync_version_difference: Option<i64>,
    /// Signature components that differ: "content", "variants", "images"
    pub changed_components: Vec<String>,
    pub last_sync_at: Option<i64>,
}

/// Outcome of conflict detection for one SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictDetectionResult {
    pub has_conflict: bool,
    pub conflict_type: ConflictType,
    /// Human-readable classification trail
    pub reasons: Vec<String>,
    pub local_product: Option<Product>,
    pub remote_product: Option<RemoteProduct>,
    pub resolution_strategy: ResolutionStrategy,
    pub metadata: ConflictMetadata,
}

/// What the resolver decided to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    AcceptedLocal,
    AcceptedRemote,
    Merged,
    Skipped,
    ManualReview,
    Error,
}

impl ResolutionAction {
    /// Stable string form used in the event ledger
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AcceptedLocal => "accepted_local",
            Self::AcceptedRemote => "accepted_remote",
            Self::Merged => "merged",
            Self::Skipped => "skipped",
            Self::ManualReview => "manual_review",
            Self::Error => "error",
        }
    }
}

/// Outcome of executing a resolution strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub resolved: bool,
    pub action: ResolutionAction,
    /// Partial update to persist, when the resolution writes anything
    pub updated_product: Option<ProductUpdate>,
    pub reason: String,
    /// Strategy-specific details (signature snapshots, merge provenance, ...)
    pub metadata: serde_json::Value,
}

impl ResolutionResult {
    /// A resolution that writes nothing
    #[must_use]
    pub fn no_op(action: ResolutionAction, reason: impl Into<String>) -> Self {
        Self {
            resolved: true,
            action,
            updated_product: None,
            reason: reason.into(),
            metadata: serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_type_round_trip() {
        for conflict_type in [
            ConflictType::None,
            ConflictType::VersionMismatch,
            ConflictType::ContentChange,
            ConflictType::VariantChange,
            ConflictType::ImageChange,
            ConflictType::ConcurrentModification,
            ConflictType::LocalNewer,
            ConflictType::RemoteNewer,
        ] {
            let parsed: ConflictType = conflict_type.as_str().parse().unwrap();
            assert_eq!(parsed, conflict_type);
        }
    }

    #[test]
    fn test_no_op_resolution() {
        let result = ResolutionResult::no_op(ResolutionAction::Skipped, "unchanged");
        assert!(result.resolved);
        assert!(result.updated_product.is_none());
        assert_eq!(result.action, ResolutionAction::Skipped);
    }
}
