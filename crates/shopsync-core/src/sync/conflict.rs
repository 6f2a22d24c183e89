//! Conflict detection.
//!
//! Classification runs through an explicit ordered rule chain; later rules
//! override earlier ones, and the precedence lives in exactly one place
//! (`ConflictDetector::detect`).

use crate::models::{
    ConflictDetectionResult, ConflictMetadata, ConflictType, Product, RemoteProduct,
    ResolutionStrategy, SyncDirection, VendorPriority,
};
use crate::sync::signature::{has_product_changed, StoredSignatures};
use crate::Result;

/// Default tolerance when comparing local and remote modification times
pub const DEFAULT_TIMESTAMP_TOLERANCE_MS: i64 = 5_000;

/// Caller options steering conflict classification
#[derive(Debug, Clone)]
pub struct ConflictDetectionOptions {
    pub direction: SyncDirection,
    /// Explicit side preference; forces `VendorPriority` on concurrent edits
    pub vendor_priority: Option<VendorPriority>,
    /// Timestamps closer than this are treated as simultaneous (ms)
    pub timestamp_tolerance_ms: i64,
    /// Resolve simultaneous concurrent edits by field-group merge
    pub enable_auto_merge: bool,
    /// Classify unchanged products as no-conflict skips
    pub skip_unchanged: bool,
}

impl Default for ConflictDetectionOptions {
    fn default() -> Self {
        Self {
            direction: SyncDirection::RemoteToLocal,
            vendor_priority: None,
            timestamp_tolerance_ms: DEFAULT_TIMESTAMP_TOLERANCE_MS,
            enable_auto_merge: false,
            skip_unchanged: true,
        }
    }
}

/// Classifies divergence between a local product and its remote counterpart
pub struct ConflictDetector;

impl ConflictDetector {
    /// Classify the conflict for one SKU.
    ///
    /// `local` is the stored product for the remote product's SKU, when one
    /// exists. Classification is pure CPU work; callers do the lookup.
    pub fn detect(
        local: Option<&Product>,
        remote: &RemoteProduct,
        options: &ConflictDetectionOptions,
    ) -> Result<ConflictDetectionResult> {
        let Some(local) = local else {
            // Create path: nothing to conflict with
            return Ok(ConflictDetectionResult {
                has_conflict: false,
                conflict_type: ConflictType::None,
                reasons: vec!["no local product for SKU; create from remote".to_string()],
                local_product: None,
                remote_product: Some(remote.clone()),
                resolution_strategy: ResolutionStrategy::AcceptRemote,
                metadata: ConflictMetadata {
                    remote_last_modified: remote.updated_at_ms(),
                    ..Default::default()
                },
            });
        };

        let report = has_product_changed(remote, &StoredSignatures::from(local))?;

        // Both flags default to true when the product has never synced
        let local_modified_since_sync = local
            .last_sync_at
            .is_none_or(|last_sync| local.updated_at > last_sync);
        let remote_modified_since_sync = match (local.last_sync_at, remote.updated_at_ms()) {
            (Some(last_sync), Some(remote_ts)) => remote_ts > last_sync,
            _ => true,
        };

        let mut conflict_type = ConflictType::None;
        let mut strategy: Option<ResolutionStrategy> = None;
        let mut reasons = Vec::new();

        // 1. Version counter indicates prior accepted updates
        if local.sync_version > 1 && report.has_changed {
            conflict_type = ConflictType::VersionMismatch;
            reasons.push(format!(
                "local sync_version {} with detected changes",
                local.sync_version
            ));
        }

        // 2. Component classification; checked in content → variants → images
        //    order, last-checked wins
        if report.has_changed {
            for component in &report.changed_components {
                conflict_type = match component.as_str() {
                    "content" => ConflictType::ContentChange,
                    "variants" => ConflictType::VariantChange,
                    _ => ConflictType::ImageChange,
                };
            }
            reasons.push(format!(
                "changed components: {}",
                report.changed_components.join(", ")
            ));
        }

        // 3. Concurrent modification overrides component classification
        if local_modified_since_sync && remote_modified_since_sync {
            conflict_type = ConflictType::ConcurrentModification;
            reasons.push("both sides modified since last sync".to_string());

            let remote_ts = remote.updated_at_ms();
            let simultaneous = remote_ts
                .is_none_or(|ts| (local.updated_at - ts).abs() <= options.timestamp_tolerance_ms);
            strategy = Some(if simultaneous {
                if options.enable_auto_merge {
                    reasons.push("timestamps inconclusive; auto-merge enabled".to_string());
                    ResolutionStrategy::Merge
                } else if options.vendor_priority.is_some() {
                    reasons.push("timestamps inconclusive; vendor priority set".to_string());
                    ResolutionStrategy::VendorPriority
                } else {
                    reasons.push("timestamps inconclusive; queueing for review".to_string());
                    ResolutionStrategy::ManualReview
                }
            } else {
                reasons.push("timestamps decisive; newer side wins".to_string());
                ResolutionStrategy::TimestampBased
            });
        } else if local_modified_since_sync {
            // 4. Only the local side moved
            conflict_type = ConflictType::LocalNewer;
            reasons.push("only local modified since last sync".to_string());
            strategy = Some(if options.direction == SyncDirection::LocalToRemote {
                ResolutionStrategy::AcceptLocal
            } else {
                ResolutionStrategy::SkipSync
            });
        } else if remote_modified_since_sync {
            // 5. Only the remote side moved
            conflict_type = ConflictType::RemoteNewer;
            reasons.push("only remote modified since last sync".to_string());
            strategy = Some(if options.direction == SyncDirection::RemoteToLocal {
                ResolutionStrategy::AcceptRemote
            } else {
                ResolutionStrategy::TimestampBased
            });
        }

        // 6. Explicit vendor priority forces the concurrent strategy
        if conflict_type == ConflictType::ConcurrentModification
            && options.vendor_priority.is_some()
        {
            strategy = Some(ResolutionStrategy::VendorPriority);
        }

        // 7. Final override: unchanged products are skipped outright
        if !report.has_changed && options.skip_unchanged {
            conflict_type = ConflictType::None;
            strategy = Some(ResolutionStrategy::SkipSync);
            reasons.push("no signature change; skip_unchanged enabled".to_string());
        }

        let resolution_strategy = strategy.unwrap_or(ResolutionStrategy::TimestampBased);

        Ok(ConflictDetectionResult {
            has_conflict: conflict_type != ConflictType::None,
            conflict_type,
            reasons,
            local_product: Some(local.clone()),
            remote_product: Some(remote.clone()),
            resolution_strategy,
            metadata: ConflictMetadata {
                local_last_modified: Some(local.updated_at),
                remote_last_modified: remote.updated_at_ms(),
                sync_version_difference: Some(local.sync_version - 1),
                changed_components: report.changed_components,
                last_sync_at: local.last_sync_at,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProductId, ProductStatus};
    use crate::sync::signature::compute_product_signatures;
    use pretty_assertions::assert_eq;

    fn remote_product(updated_at: &str) -> RemoteProduct {
        serde_json::from_value(serde_json::json!({
            "id": 101,
            "title": "Trail Shirt",
            "body_html": "<p>Breathable</p>",
            "tags": "outdoor",
            "status": "active",
            "variants": [
                {"price": "10.00", "sku": "TS-1", "inventory_quantity": 5, "option1": "M"}
            ],
            "images": [{"src": "https://cdn.example.com/1.jpg", "position": 1}],
            "updated_at": updated_at
        }))
        .unwrap()
    }

    /// A local product that synced cleanly from `remote` at `last_sync_at`
    fn synced_local(remote: &RemoteProduct, last_sync_at: i64) -> Product {
        let signatures = compute_product_signatures(remote).unwrap();
        Product {
            id: ProductId::new(),
            vendor_id: "vendor-1".to_string(),
            sku: "TS-1".to_string(),
            name: remote.title.clone(),
            description: remote.body_html.clone().unwrap_or_default(),
            status: ProductStatus::Active,
            price: "10.00".to_string(),
            compare_at_price: None,
            inventory: 5,
            tags: remote.tag_list(),
            images: Vec::new(),
            variants: Vec::new(),
            content_hash: Some(signatures.content_hash),
            variants_hash: Some(signatures.variants_hash),
            images_hash: Some(signatures.images_hash),
            last_hashed_at: Some(last_sync_at),
            sync_version: 1,
            needs_sync: false,
            last_modified_by: None,
            sync_conflict: None,
            last_sync_at: Some(last_sync_at),
            remote_updated_at: remote.updated_at_ms(),
            created_at: last_sync_at - 10_000,
            updated_at: last_sync_at - 1_000,
        }
    }

    #[test]
    fn missing_local_is_create_path() {
        let remote = remote_product("2024-03-01T12:00:00Z");
        let result =
            ConflictDetector::detect(None, &remote, &ConflictDetectionOptions::default()).unwrap();

        assert!(!result.has_conflict);
        assert_eq!(result.conflict_type, ConflictType::None);
        assert_eq!(result.resolution_strategy, ResolutionStrategy::AcceptRemote);
        assert!(result.local_product.is_none());
    }

    #[test]
    fn unchanged_with_skip_unchanged_is_skip() {
        // Scenario A: identical signatures, nothing modified since sync
        let remote = remote_product("2024-03-01T12:00:00Z");
        let last_sync = remote.updated_at_ms().unwrap() + 60_000;
        let local = synced_local(&remote, last_sync);

        let result = ConflictDetector::detect(
            Some(&local),
            &remote,
            &ConflictDetectionOptions::default(),
        )
        .unwrap();

        assert!(!result.has_conflict);
        assert_eq!(result.conflict_type, ConflictType::None);
        assert_eq!(result.resolution_strategy, ResolutionStrategy::SkipSync);
        assert!(result.metadata.changed_components.is_empty());
    }

    #[test]
    fn remote_only_change_accepts_remote() {
        // Scenario B: remote variant price changed, local untouched since sync
        let baseline = remote_product("2024-03-01T12:00:00Z");
        let last_sync = baseline.updated_at_ms().unwrap() + 60_000;
        let local = synced_local(&baseline, last_sync);

        let mut remote = remote_product("2024-03-02T12:00:00Z");
        remote.variants[0].price = "12.00".to_string();

        let result = ConflictDetector::detect(
            Some(&local),
            &remote,
            &ConflictDetectionOptions::default(),
        )
        .unwrap();

        assert!(result.has_conflict);
        assert_eq!(result.conflict_type, ConflictType::RemoteNewer);
        assert_eq!(result.resolution_strategy, ResolutionStrategy::AcceptRemote);
        assert_eq!(
            result.metadata.changed_components,
            vec!["variants".to_string()]
        );
    }

    #[test]
    fn concurrent_with_vendor_priority_forces_strategy() {
        // Scenario C: both sides modified, explicit vendor priority
        let baseline = remote_product("2024-03-01T12:00:00Z");
        let last_sync = baseline.updated_at_ms().unwrap() + 60_000;
        let mut local = synced_local(&baseline, last_sync);
        local.updated_at = last_sync + 30_000;

        let mut remote = remote_product("2024-03-05T12:00:00Z");
        remote.variants[0].price = "12.00".to_string();

        let options = ConflictDetectionOptions {
            vendor_priority: Some(VendorPriority::Remote),
            ..Default::default()
        };
        let result = ConflictDetector::detect(Some(&local), &remote, &options).unwrap();

        assert!(result.has_conflict);
        assert_eq!(
            result.conflict_type,
            ConflictType::ConcurrentModification
        );
        assert_eq!(
            result.resolution_strategy,
            ResolutionStrategy::VendorPriority
        );
    }

    #[test]
    fn concurrent_with_decisive_timestamps_is_timestamp_based() {
        let baseline = remote_product("2024-03-01T12:00:00Z");
        let last_sync = baseline.updated_at_ms().unwrap() + 60_000;
        let mut local = synced_local(&baseline, last_sync);
        local.updated_at = last_sync + 30_000;

        // Remote far newer than local's edit
        let mut remote = remote_product("2024-03-09T12:00:00Z");
        remote.variants[0].price = "12.00".to_string();

        let result = ConflictDetector::detect(
            Some(&local),
            &remote,
            &ConflictDetectionOptions::default(),
        )
        .unwrap();

        assert_eq!(
            result.conflict_type,
            ConflictType::ConcurrentModification
        );
        assert_eq!(
            result.resolution_strategy,
            ResolutionStrategy::TimestampBased
        );
    }

    #[test]
    fn concurrent_simultaneous_with_auto_merge_merges() {
        let baseline = remote_product("2024-03-01T12:00:00Z");
        let last_sync = baseline.updated_at_ms().unwrap() + 60_000;

        let mut remote = remote_product("2024-03-01T12:00:00Z");
        remote.updated_at = None; // Missing remote timestamp is inconclusive
        remote.variants[0].price = "12.00".to_string();

        let mut local = synced_local(&baseline, last_sync);
        local.updated_at = last_sync + 30_000;

        let options = ConflictDetectionOptions {
            enable_auto_merge: true,
            ..Default::default()
        };
        let result = ConflictDetector::detect(Some(&local), &remote, &options).unwrap();

        assert_eq!(result.resolution_strategy, ResolutionStrategy::Merge);
    }

    #[test]
    fn concurrent_simultaneous_without_hints_goes_to_review() {
        let baseline = remote_product("2024-03-01T12:00:00Z");
        let last_sync = baseline.updated_at_ms().unwrap() + 60_000;

        let mut remote = remote_product("2024-03-01T12:00:00Z");
        remote.updated_at = None;
        remote.variants[0].price = "12.00".to_string();

        let mut local = synced_local(&baseline, last_sync);
        local.updated_at = last_sync + 30_000;

        let result = ConflictDetector::detect(
            Some(&local),
            &remote,
            &ConflictDetectionOptions::default(),
        )
        .unwrap();

        assert_eq!(
            result.resolution_strategy,
            ResolutionStrategy::ManualReview
        );
    }

    #[test]
    fn local_only_change_skips_on_remote_to_local() {
        let baseline = remote_product("2024-03-01T12:00:00Z");
        let last_sync = baseline.updated_at_ms().unwrap() + 60_000;
        let mut local = synced_local(&baseline, last_sync);
        // Local edit after sync that also changed the stored name (hash
        // still matches remote, so only timestamps disagree)
        local.updated_at = last_sync + 30_000;

        let result = ConflictDetector::detect(
            Some(&local),
            &baseline,
            &ConflictDetectionOptions {
                skip_unchanged: false,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(result.conflict_type, ConflictType::LocalNewer);
        assert_eq!(result.resolution_strategy, ResolutionStrategy::SkipSync);
    }

    #[test]
    fn version_mismatch_is_recorded_in_reasons() {
        let baseline = remote_product("2024-03-01T12:00:00Z");
        let last_sync = baseline.updated_at_ms().unwrap() + 60_000;
        let mut local = synced_local(&baseline, last_sync);
        local.sync_version = 3;

        let mut remote = remote_product("2024-03-02T12:00:00Z");
        remote.title = "Trail Shirt v2".to_string();

        let result = ConflictDetector::detect(
            Some(&local),
            &remote,
            &ConflictDetectionOptions::default(),
        )
        .unwrap();

        assert!(result
            .reasons
            .iter()
            .any(|reason| reason.contains("sync_version 3")));
        assert_eq!(result.metadata.sync_version_difference, Some(2));
    }

    #[test]
    fn redetect_after_sync_is_idempotent() {
        // A second pass over an unmodified product must not re-flag it
        let remote = remote_product("2024-03-01T12:00:00Z");
        let last_sync = remote.updated_at_ms().unwrap() + 60_000;
        let local = synced_local(&remote, last_sync);

        let options = ConflictDetectionOptions::default();
        let first = ConflictDetector::detect(Some(&local), &remote, &options).unwrap();
        let second = ConflictDetector::detect(Some(&local), &remote, &options).unwrap();

        assert!(!first.has_conflict);
        assert!(!second.has_conflict);
        assert_eq!(second.resolution_strategy, ResolutionStrategy::SkipSync);
    }
}
