//! Conflict resolution.
//!
//! Executes the strategy chosen by the detector: build an update payload, do
//! nothing, or park the conflict for manual review. Applying a resolution is
//! the only place here that writes product rows.

use serde_json::json;

use crate::models::{
    ConflictDetectionResult, ManualReviewItem, Product, ProductStatus, ProductSyncEvent,
    ProductUpdate, RemoteProduct, ResolutionAction, ResolutionResult, ResolutionStrategy,
    ReviewDecision, ReviewId, RunId, SyncEventType, SyncOperation, VendorPriority,
};
use crate::services::CatalogStore;
use crate::sync::conflict::DEFAULT_TIMESTAMP_TOLERANCE_MS;
use crate::sync::signature::compute_product_signatures;
use crate::sync::FieldToggles;
use crate::{Error, Result};

/// Caller options steering resolution
#[derive(Debug, Clone)]
pub struct ResolutionOptions {
    /// Side that wins `VendorPriority` decisions (default: local)
    pub vendor_priority: Option<VendorPriority>,
    /// Timestamps closer than this are treated as simultaneous (ms)
    pub timestamp_tolerance_ms: i64,
    pub auto_merge_enabled: bool,
    /// Keep local inventory counts when accepting remote data
    pub preserve_local_inventory: bool,
    /// Keep local pricing when accepting remote data
    pub preserve_local_pricing: bool,
    /// Allow parking conflicts in the review queue
    pub allow_manual_review: bool,
}

impl Default for ResolutionOptions {
    fn default() -> Self {
        Self {
            vendor_priority: None,
            timestamp_tolerance_ms: DEFAULT_TIMESTAMP_TOLERANCE_MS,
            auto_merge_enabled: false,
            preserve_local_inventory: false,
            preserve_local_pricing: false,
            allow_manual_review: true,
        }
    }
}

/// Outcome of applying a resolution to the store
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub success: bool,
    /// The stored product after the write, when one happened
    pub product: Option<Product>,
    pub error_message: Option<String>,
}

/// Executes resolution strategies against the catalog store
#[derive(Clone)]
pub struct ConflictResolver {
    store: CatalogStore,
}

impl ConflictResolver {
    /// Create a resolver backed by the given store
    #[must_use]
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }

    /// Execute the strategy chosen by the detector.
    ///
    /// Returns the decision and, for writing strategies, the update payload;
    /// nothing is persisted here except review-queue items.
    pub async fn resolve_conflict(
        &self,
        result: &ConflictDetectionResult,
        options: &ResolutionOptions,
        sync_run_id: RunId,
    ) -> Result<ResolutionResult> {
        match result.resolution_strategy {
            ResolutionStrategy::AcceptLocal => Ok(Self::accept_local(result)),
            ResolutionStrategy::AcceptRemote => Self::accept_remote(result, options),
            ResolutionStrategy::VendorPriority => Self::vendor_priority(result, options),
            ResolutionStrategy::TimestampBased => Self::timestamp_based(result, options),
            ResolutionStrategy::Merge => Self::merge(result, options),
            ResolutionStrategy::SkipSync => Ok(ResolutionResult::no_op(
                ResolutionAction::Skipped,
                "no change requiring sync",
            )),
            ResolutionStrategy::ManualReview => {
                if options.allow_manual_review {
                    self.enqueue_manual_review(result, sync_run_id).await
                } else {
                    // Review queue disabled: decide by vendor priority
                    Self::vendor_priority(result, options)
                }
            }
        }
    }

    /// Keep the local version; the prior signature snapshot goes into
    /// metadata for the audit trail.
    fn accept_local(result: &ConflictDetectionResult) -> ResolutionResult {
        let snapshot = result.local_product.as_ref().map(|local| {
            json!({
                "content_hash": local.content_hash,
                "variants_hash": local.variants_hash,
                "images_hash": local.images_hash,
                "sync_version": local.sync_version,
            })
        });

        ResolutionResult {
            resolved: true,
            action: ResolutionAction::AcceptedLocal,
            updated_product: None,
            reason: "local version kept".to_string(),
            metadata: snapshot.unwrap_or(serde_json::Value::Null),
        }
    }

    /// Accept the remote version: build a partial update with fresh hashes
    /// and an incremented version.
    fn accept_remote(
        result: &ConflictDetectionResult,
        options: &ResolutionOptions,
    ) -> Result<ResolutionResult> {
        let local = require_local(result)?;
        let remote = require_remote(result)?;

        let update = build_remote_update(local, remote, options, &FieldToggles::default())?;

        Ok(ResolutionResult {
            resolved: true,
            action: ResolutionAction::AcceptedRemote,
            updated_product: Some(update),
            reason: "remote version accepted".to_string(),
            metadata: json!({
                "preserve_local_pricing": options.preserve_local_pricing,
                "preserve_local_inventory": options.preserve_local_inventory,
            }),
        })
    }

    /// Delegate to the configured side; local when no preference is set.
    fn vendor_priority(
        result: &ConflictDetectionResult,
        options: &ResolutionOptions,
    ) -> Result<ResolutionResult> {
        match options.vendor_priority.unwrap_or(VendorPriority::Local) {
            VendorPriority::Local => Ok(Self::accept_local(result)),
            VendorPriority::Remote => Self::accept_remote(result, options),
        }
    }

    /// The strictly newer side wins; missing data or timestamps within
    /// tolerance fall back to vendor priority.
    fn timestamp_based(
        result: &ConflictDetectionResult,
        options: &ResolutionOptions,
    ) -> Result<ResolutionResult> {
        match (
            result.metadata.local_last_modified,
            result.metadata.remote_last_modified,
        ) {
            (Some(local), Some(remote))
                if (local - remote).abs() > options.timestamp_tolerance_ms =>
            {
                if local > remote {
                    Ok(Self::accept_local(result))
                } else {
                    Self::accept_remote(result, options)
                }
            }
            _ => Self::vendor_priority(result, options),
        }
    }

    /// Field-group merge: content follows `changed_components`, pricing and
    /// inventory follow their preserve flags, hashes and version always
    /// recompute.
    fn merge(
        result: &ConflictDetectionResult,
        options: &ResolutionOptions,
    ) -> Result<ResolutionResult> {
        let local = require_local(result)?;
        let remote = require_remote(result)?;

        let signatures = compute_product_signatures(remote)?;
        let now = chrono::Utc::now().timestamp_millis();
        let mut merged_fields = serde_json::Map::new();

        let mut update = ProductUpdate {
            content_hash: Some(signatures.content_hash),
            variants_hash: Some(signatures.variants_hash),
            images_hash: Some(signatures.images_hash),
            last_hashed_at: Some(now),
            sync_version: Some(local.sync_version + 1),
            needs_sync: Some(false),
            sync_conflict: Some(None),
            last_sync_at: Some(now),
            remote_updated_at: remote.updated_at_ms(),
            last_modified_by: Some("sync:merge".to_string()),
            ..Default::default()
        };

        let content_from_remote = result
            .metadata
            .changed_components
            .iter()
            .any(|component| component == "content");
        if content_from_remote {
            update.name = Some(remote.title.clone());
            update.description = Some(remote.body_html.clone().unwrap_or_default());
            update.status = Some(ProductStatus::from_remote(remote.status.as_deref()));
            update.tags = Some(remote.tag_list());
            merged_fields.insert("content".to_string(), json!("remote"));
        } else {
            merged_fields.insert("content".to_string(), json!("local"));
        }

        if options.preserve_local_pricing {
            merged_fields.insert("pricing".to_string(), json!("local"));
        } else if let Some(variant) = remote.primary_variant() {
            update.price = Some(variant.price.clone());
            update.compare_at_price = variant.compare_at_price.clone();
            merged_fields.insert("pricing".to_string(), json!("remote"));
        }

        if options.preserve_local_inventory {
            merged_fields.insert("inventory".to_string(), json!("local"));
        } else {
            update.inventory = Some(total_inventory(remote));
            merged_fields.insert("inventory".to_string(), json!("remote"));
        }

        Ok(ResolutionResult {
            resolved: true,
            action: ResolutionAction::Merged,
            updated_product: Some(update),
            reason: "field-group merge applied".to_string(),
            metadata: json!({ "merged_fields": merged_fields }),
        })
    }

    /// Park the conflict in the durable review queue (FIFO by creation time).
    async fn enqueue_manual_review(
        &self,
        result: &ConflictDetectionResult,
        sync_run_id: RunId,
    ) -> Result<ResolutionResult> {
        let local = require_local(result)?;
        let remote = require_remote(result)?;

        let item = ManualReviewItem::new(
            local.sku.clone(),
            result.conflict_type,
            serde_json::to_value(local)?,
            serde_json::to_value(remote)?,
            result.reasons.join("; "),
        );
        self.store.enqueue_review(&item).await?;
        tracing::info!(
            sku = %item.sku,
            review_id = %item.id,
            run_id = %sync_run_id,
            "conflict queued for manual review"
        );

        Ok(ResolutionResult {
            resolved: false,
            action: ResolutionAction::ManualReview,
            updated_product: None,
            reason: "queued for manual review".to_string(),
            metadata: json!({ "review_id": item.id.as_str() }),
        })
    }

    /// Persist a resolution's update for the product with this SKU and emit
    /// the matching ledger event.
    ///
    /// A persistence failure is captured as an error event and a failed
    /// outcome; it does not propagate as `Err`.
    pub async fn apply_resolution(
        &self,
        resolution: &ResolutionResult,
        sku: &str,
        sync_run_id: RunId,
    ) -> Result<ApplyOutcome> {
        let started = std::time::Instant::now();
        let local = self
            .store
            .get_product_by_sku(sku)
            .await?
            .ok_or_else(|| Error::NotFound(format!("product with SKU {sku}")))?;

        let (event_type, written) = match (&resolution.action, &resolution.updated_product) {
            (ResolutionAction::AcceptedRemote | ResolutionAction::Merged, Some(update)) => {
                match self.store.update_product(&local.id, update).await {
                    Ok(product) => (SyncEventType::Update, Some(product)),
                    Err(error) => {
                        let mut event = ProductSyncEvent::new(
                            sync_run_id,
                            sku,
                            SyncEventType::Error,
                            SyncOperation::Save,
                        );
                        event.product_id = Some(local.id);
                        event.old_version = Some(local.sync_version);
                        event.success = false;
                        event.error_message = Some(error.to_string());
                        event.processing_time_ms = Some(elapsed_ms(started));
                        self.store.record_event(&event).await?;

                        return Ok(ApplyOutcome {
                            success: false,
                            product: None,
                            error_message: Some(error.to_string()),
                        });
                    }
                }
            }
            (ResolutionAction::ManualReview, _) => (SyncEventType::Conflict, None),
            _ => (SyncEventType::Skip, None),
        };

        let mut event = ProductSyncEvent::new(sync_run_id, sku, event_type, SyncOperation::Save);
        event.product_id = Some(local.id);
        event.old_hash = local.content_hash.clone();
        event.old_version = Some(local.sync_version);
        event.success = resolution.resolved;
        if event_type == SyncEventType::Skip {
            event.skipped_reason = Some(resolution.reason.clone());
        }
        if event_type == SyncEventType::Conflict {
            event.conflict_reason = Some(resolution.reason.clone());
        }
        if let Some(product) = &written {
            event.new_hash = product.content_hash.clone();
            event.new_version = Some(product.sync_version);
            event.after_data = Some(serde_json::to_value(product)?);
        }
        if let Some(update) = &resolution.updated_product {
            event.changed_fields = changed_field_names(update);
        }
        event.processing_time_ms = Some(elapsed_ms(started));
        self.store.record_event(&event).await?;

        Ok(ApplyOutcome {
            success: true,
            product: written,
            error_message: None,
        })
    }

    /// Resolve a parked review item with a caller decision.
    pub async fn resolve_manual_review(
        &self,
        id: ReviewId,
        decision: ReviewDecision,
        custom_data: Option<ProductUpdate>,
    ) -> Result<ResolutionResult> {
        let item = self
            .store
            .get_review(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("review item {id}")))?;

        let outcome = match decision {
            ReviewDecision::AcceptLocal => ResolutionResult::no_op(
                ResolutionAction::AcceptedLocal,
                "reviewer kept the local version",
            ),
            ReviewDecision::AcceptRemote => {
                let remote: RemoteProduct = serde_json::from_value(item.remote_data.clone())?;
                let local = self
                    .store
                    .get_product_by_sku(&item.sku)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("product with SKU {}", item.sku)))?;

                let options = ResolutionOptions {
                    vendor_priority: Some(VendorPriority::Remote),
                    ..Default::default()
                };
                let update =
                    build_remote_update(&local, &remote, &options, &FieldToggles::default())?;
                let product = self.store.update_product(&local.id, &update).await?;

                ResolutionResult {
                    resolved: true,
                    action: ResolutionAction::AcceptedRemote,
                    updated_product: Some(update),
                    reason: "reviewer accepted the remote version".to_string(),
                    metadata: json!({ "sync_version": product.sync_version }),
                }
            }
            ReviewDecision::Custom => {
                let update = custom_data.ok_or_else(|| {
                    Error::InvalidInput(
                        "custom review decision requires caller-supplied data".to_string(),
                    )
                })?;
                let local = self
                    .store
                    .get_product_by_sku(&item.sku)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("product with SKU {}", item.sku)))?;
                self.store.update_product(&local.id, &update).await?;

                ResolutionResult {
                    resolved: true,
                    action: ResolutionAction::Merged,
                    updated_product: Some(update),
                    reason: "reviewer applied custom data".to_string(),
                    metadata: serde_json::Value::Null,
                }
            }
        };

        self.store.mark_review_resolved(id).await?;
        Ok(outcome)
    }
}

fn require_local(result: &ConflictDetectionResult) -> Result<&Product> {
    result
        .local_product
        .as_ref()
        .ok_or_else(|| Error::Sync("resolution requires a local product".to_string()))
}

fn require_remote(result: &ConflictDetectionResult) -> Result<&RemoteProduct> {
    result
        .remote_product
        .as_ref()
        .ok_or_else(|| Error::Sync("resolution requires a remote product".to_string()))
}

/// Sum of variant inventory quantities
fn total_inventory(remote: &RemoteProduct) -> i64 {
    remote
        .variants
        .iter()
        .map(|variant| variant.inventory_quantity.unwrap_or_default())
        .sum()
}

fn elapsed_ms(started: std::time::Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

/// List the field names an update touches, for the event ledger.
fn changed_field_names(update: &ProductUpdate) -> Vec<String> {
    let mut fields = Vec::new();
    if update.name.is_some() {
        fields.push("name".to_string());
    }
    if update.description.is_some() {
        fields.push("description".to_string());
    }
    if update.status.is_some() {
        fields.push("status".to_string());
    }
    if update.price.is_some() {
        fields.push("price".to_string());
    }
    if update.compare_at_price.is_some() {
        fields.push("compare_at_price".to_string());
    }
    if update.inventory.is_some() {
        fields.push("inventory".to_string());
    }
    if update.tags.is_some() {
        fields.push("tags".to_string());
    }
    if update.images.is_some() {
        fields.push("images".to_string());
    }
    if update.variants.is_some() {
        fields.push("variants".to_string());
    }
    fields
}

/// Build the partial update that makes the local product mirror the remote
/// one.
///
/// The three hashes and `last_hashed_at` are stamped together, and the
/// version increments by exactly one. Preserve flags and field toggles skip
/// overwriting the named groups.
pub fn build_remote_update(
    local: &Product,
    remote: &RemoteProduct,
    options: &ResolutionOptions,
    toggles: &FieldToggles,
) -> Result<ProductUpdate> {
    let signatures = compute_product_signatures(remote)?;
    let now = chrono::Utc::now().timestamp_millis();

    let mut update = ProductUpdate {
        name: Some(remote.title.clone()),
        status: Some(ProductStatus::from_remote(remote.status.as_deref())),
        content_hash: Some(signatures.content_hash),
        variants_hash: Some(signatures.variants_hash),
        images_hash: Some(signatures.images_hash),
        last_hashed_at: Some(now),
        sync_version: Some(local.sync_version + 1),
        needs_sync: Some(false),
        sync_conflict: Some(None),
        last_sync_at: Some(now),
        remote_updated_at: remote.updated_at_ms(),
        last_modified_by: Some("sync:remote".to_string()),
        ..Default::default()
    };

    if toggles.descriptions {
        update.description = Some(remote.body_html.clone().unwrap_or_default());
    }
    if toggles.tags {
        update.tags = Some(remote.tag_list());
    }
    if toggles.images {
        update.images = Some(local_images_from_remote(remote));
    }
    if toggles.variants {
        update.variants = Some(local_variants_from_remote(remote));
    }
    if toggles.pricing && !options.preserve_local_pricing {
        if let Some(variant) = remote.primary_variant() {
            update.price = Some(variant.price.clone());
            update.compare_at_price = variant.compare_at_price.clone();
        }
    }
    if toggles.inventory && !options.preserve_local_inventory {
        update.inventory = Some(total_inventory(remote));
    }

    Ok(update)
}

/// Convert remote images to local storage form, defaulting positions
pub fn local_images_from_remote(remote: &RemoteProduct) -> Vec<crate::models::ProductImage> {
    remote
        .images
        .iter()
        .enumerate()
        .map(|(index, image)| crate::models::ProductImage {
            src: image.src.clone(),
            position: image
                .position
                .unwrap_or_else(|| i64::try_from(index).unwrap_or(i64::MAX - 1) + 1),
        })
        .collect()
}

/// Convert remote variants to local storage form, defaulting positions
pub fn local_variants_from_remote(remote: &RemoteProduct) -> Vec<crate::models::ProductVariant> {
    remote
        .variants
        .iter()
        .enumerate()
        .map(|(index, variant)| crate::models::ProductVariant {
            sku: variant.sku.clone(),
            price: variant.price.clone(),
            compare_at_price: variant.compare_at_price.clone(),
            barcode: variant.barcode.clone(),
            inventory_quantity: variant.inventory_quantity.unwrap_or_default(),
            options: variant.option_values(),
            position: variant
                .position
                .unwrap_or_else(|| i64::try_from(index).unwrap_or(i64::MAX - 1) + 1),
        })
        .collect()
}
