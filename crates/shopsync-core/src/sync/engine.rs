//! The idempotent sync orchestrator.
//!
//! Composes the detector, resolver, run manager, and retry executor into the
//! remote-to-local pipeline: page the remote catalog, match products to the
//! vendor, then detect → resolve → apply per product, sequentially. One
//! product's failure never aborts the batch; the run id ties every outcome
//! back to one auditable invocation.

use std::time::Instant;

use crate::models::{
    Product, ProductId, ProductSyncEvent, RemoteProduct, ResolutionAction, RunId, StartRunParams,
    SyncDirection, SyncEventType, SyncOperation, SyncRun, SyncRunStatus, Vendor,
};
use crate::remote::RemoteCatalog;
use crate::services::CatalogStore;
use crate::sync::conflict::{ConflictDetectionOptions, ConflictDetector};
use crate::sync::resolve::{build_remote_update, ConflictResolver, ResolutionOptions};
use crate::sync::retry::{RetryExecutor, RetryFailure};
use crate::sync::run_manager::{ProductOutcome, SyncRunManager};
use crate::sync::{signature, FieldToggles};
use crate::{Error, Result};

const DRY_RUN_REASON: &str = "Dry run mode enabled";

/// What counts as an overall successful sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SuccessPolicy {
    /// Success when there were zero hard errors or at least one product
    /// synced
    #[default]
    Lenient,
    /// Success only when nothing failed
    Strict,
}

/// Caller options for one sync invocation
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub direction: SyncDirection,
    /// Remote page size
    pub batch_size: u32,
    /// What the sync may overwrite locally
    pub fields: FieldToggles,
    pub detection: ConflictDetectionOptions,
    pub resolution: ResolutionOptions,
    /// Safety bound on remote pagination
    pub max_pages: u32,
    /// Classify everything, write nothing
    pub dry_run: bool,
    pub success_policy: SuccessPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            direction: SyncDirection::RemoteToLocal,
            batch_size: 50,
            fields: FieldToggles::default(),
            detection: ConflictDetectionOptions::default(),
            resolution: ResolutionOptions::default(),
            max_pages: 20,
            dry_run: false,
            success_policy: SuccessPolicy::default(),
        }
    }
}

/// Aggregate result of one sync invocation
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Final state of the run row
    pub run: SyncRun,
    pub success: bool,
    pub duration_ms: i64,
}

/// The sync engine: all collaborators are constructor-injected, so separate
/// engine instances are fully isolated.
pub struct SyncEngine<R> {
    store: CatalogStore,
    remote: R,
    retry: RetryExecutor,
    runs: SyncRunManager,
    resolver: ConflictResolver,
}

impl<R: RemoteCatalog> SyncEngine<R> {
    /// Create an engine with default retry/breaker configuration
    #[must_use]
    pub fn new(store: CatalogStore, remote: R) -> Self {
        Self::with_retry_executor(store, remote, RetryExecutor::default())
    }

    /// Create an engine with a custom retry executor
    #[must_use]
    pub fn with_retry_executor(store: CatalogStore, remote: R, retry: RetryExecutor) -> Self {
        let runs = SyncRunManager::new(store.clone());
        let resolver = ConflictResolver::new(store.clone());
        Self {
            store,
            remote,
            retry,
            runs,
            resolver,
        }
    }

    /// The engine's retry executor, for breaker metrics and runtime tuning
    #[must_use]
    pub const fn retry_executor(&self) -> &RetryExecutor {
        &self.retry
    }

    /// The engine's run manager, for run inspection and retry lineage
    #[must_use]
    pub const fn run_manager(&self) -> &SyncRunManager {
        &self.runs
    }

    /// Synchronize one vendor's products.
    ///
    /// The returned report carries the finalized run; a top-level failure
    /// (catastrophic fetch error) fails the run but still finalizes it with
    /// whatever partial stats exist. Only pre-run failures (unknown vendor)
    /// and unsupported directions surface as `Err`.
    pub async fn sync_products(
        &self,
        vendor_id: &str,
        sync_job_id: &str,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let vendor = self
            .store
            .get_vendor(vendor_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("vendor {vendor_id}")))?;

        let params = StartRunParams {
            sync_job_id: sync_job_id.to_string(),
            vendor_id: vendor.id.clone(),
            store_id: vendor.store_id.clone(),
            direction: options.direction,
            batch_size: options.batch_size,
            parent_run_id: None,
            retried_from_run_id: None,
        };
        self.execute_run(&vendor, params, options).await
    }

    /// Retry a prior run: a brand-new run (fresh id) referencing the old one
    /// via `retried_from_run_id`. The old id is never reused.
    pub async fn retry_sync(
        &self,
        retried_from: RunId,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let parent = self
            .runs
            .get_run(retried_from)
            .await?
            .ok_or_else(|| Error::NotFound(format!("sync run {retried_from}")))?;
        let vendor = self
            .store
            .get_vendor(&parent.vendor_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("vendor {}", parent.vendor_id)))?;

        let params = StartRunParams {
            sync_job_id: parent.sync_job_id.clone(),
            vendor_id: vendor.id.clone(),
            store_id: vendor.store_id.clone(),
            direction: options.direction,
            batch_size: options.batch_size,
            parent_run_id: parent.parent_run_id,
            retried_from_run_id: Some(parent.run_id),
        };
        self.execute_run(&vendor, params, options).await
    }

    async fn execute_run(
        &self,
        vendor: &Vendor,
        params: StartRunParams,
        options: &SyncOptions,
    ) -> Result<SyncReport> {
        let started = Instant::now();
        let run = self.runs.start_sync_run(params).await?;

        match options.direction {
            SyncDirection::RemoteToLocal => {}
            SyncDirection::LocalToRemote | SyncDirection::Bidirectional => {
                // Explicit scope boundary: fail fast, but leave a finalized run
                let message = format!(
                    "sync direction '{}' is not implemented",
                    options.direction.as_str()
                );
                self.runs
                    .complete_sync_run(run.run_id, SyncRunStatus::Failed, Some(message.clone()))
                    .await?;
                return Err(Error::Unsupported(message));
            }
        }

        match self.run_remote_to_local(run.run_id, vendor, options).await {
            Ok(()) => {
                let run = self
                    .runs
                    .complete_sync_run(run.run_id, SyncRunStatus::Completed, None)
                    .await?;
                let success = evaluate_success(&run, options.success_policy);
                Ok(SyncReport {
                    success,
                    duration_ms: elapsed_ms(started),
                    run,
                })
            }
            Err(error) => {
                tracing::error!(run_id = %run.run_id, error = %error, "sync run failed");
                let run = self
                    .runs
                    .complete_sync_run(
                        run.run_id,
                        SyncRunStatus::Failed,
                        Some(error.to_string()),
                    )
                    .await?;
                Ok(SyncReport {
                    success: false,
                    duration_ms: elapsed_ms(started),
                    run,
                })
            }
        }
    }

    /// Pull the vendor's remote products and reconcile them locally.
    async fn run_remote_to_local(
        &self,
        run_id: RunId,
        vendor: &Vendor,
        options: &SyncOptions,
    ) -> Result<()> {
        let matched = self.fetch_vendor_products(run_id, vendor, options).await?;

        self.runs
            .set_products_found(run_id, matched.len() as u64)
            .await?;

        for remote_product in &matched {
            if let Err(failure) = self
                .process_product(run_id, vendor, remote_product, options)
                .await
            {
                // One product's failure never aborts the batch
                let sku = remote_product.primary_sku().unwrap_or("<missing>");
                self.record_product_failure(run_id, remote_product, sku, &failure)
                    .await?;
            }
        }

        Ok(())
    }

    /// Page the remote catalog and keep the vendor's products.
    async fn fetch_vendor_products(
        &self,
        run_id: RunId,
        vendor: &Vendor,
        options: &SyncOptions,
    ) -> Result<Vec<RemoteProduct>> {
        let mut matched = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0u32;

        loop {
            if pages >= options.max_pages {
                self.runs
                    .record_warning(
                        run_id,
                        format!("stopped paging after max_pages={} pages", options.max_pages),
                    )
                    .await?;
                break;
            }

            let fetch_started = Instant::now();
            let page = self
                .retry
                .execute("remote:get_products", || {
                    let cursor = cursor.clone();
                    async move {
                        self.remote
                            .get_products(options.batch_size, cursor.as_deref())
                            .await
                    }
                })
                .await
                .map_err(|failure| {
                    // Top-level fetch failure aborts the whole run
                    Error::from(failure)
                })?;
            let response_ms = u64::try_from(fetch_started.elapsed().as_millis()).unwrap_or(u64::MAX);
            self.runs.record_api_call(run_id, response_ms, false).await?;
            pages += 1;

            matched.extend(
                page.products
                    .into_iter()
                    .filter(|product| remote_product_matches_vendor(product, &vendor.name)),
            );

            self.runs
                .set_page_cursor(run_id, page.next_cursor.clone())
                .await?;

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::debug!(
            run_id = %run_id,
            vendor = %vendor.name,
            pages,
            matched = matched.len(),
            "remote catalog paged"
        );
        Ok(matched)
    }

    /// Run detect → resolve → apply (or create/update) for one remote
    /// product.
    async fn process_product(
        &self,
        run_id: RunId,
        vendor: &Vendor,
        remote_product: &RemoteProduct,
        options: &SyncOptions,
    ) -> std::result::Result<(), RetryFailure> {
        let started = Instant::now();

        let Some(sku) = remote_product.primary_sku().map(ToString::to_string) else {
            // Unmatchable without a SKU; skip with an audit trail
            let mut event = ProductSyncEvent::new(
                run_id,
                format!("remote:{}", remote_product.id),
                SyncEventType::Skip,
                SyncOperation::Compare,
            );
            event.skipped_reason = Some("remote product has no SKU".to_string());
            event.remote_data = serde_json::to_value(remote_product).ok();
            self.record(run_id, &event, "<missing>", &ProductOutcome::Skipped)
                .await?;
            return Ok(());
        };

        // Detect (store lookup under retry, classification pure)
        let local = self
            .retry
            .execute("store:get_product", || {
                let sku = sku.clone();
                async move { self.store.get_product_by_sku(&sku).await }
            })
            .await?;
        let detection = ConflictDetector::detect(local.as_ref(), remote_product, &options.detection)
            .map_err(|error| self.as_failure(&error))?;

        // Compare event: the classification outcome, whatever happens next
        let mut compare = ProductSyncEvent::new(
            run_id,
            sku.clone(),
            if detection.has_conflict {
                SyncEventType::Conflict
            } else {
                SyncEventType::Skip
            },
            SyncOperation::Compare,
        );
        compare.product_id = local.as_ref().map(|product| product.id);
        compare.old_hash = local.as_ref().and_then(|product| product.content_hash.clone());
        compare.old_version = local.as_ref().map(|product| product.sync_version);
        compare.changed_fields = detection.metadata.changed_components.clone();
        if detection.has_conflict {
            compare.conflict_reason = Some(detection.reasons.join("; "));
        }
        compare.processing_time_ms = Some(elapsed_ms(started));
        self.runs
            .record_event(&compare)
            .await
            .map_err(|error| self.as_failure(&error))?;

        if options.dry_run {
            let mut event = ProductSyncEvent::new(
                run_id,
                sku.clone(),
                SyncEventType::Skip,
                SyncOperation::Save,
            );
            event.product_id = local.as_ref().map(|product| product.id);
            event.skipped_reason = Some(DRY_RUN_REASON.to_string());
            self.record(run_id, &event, &sku, &ProductOutcome::Skipped)
                .await?;
            return Ok(());
        }

        if detection.has_conflict {
            self.runs
                .record_conflict(run_id, &sku, detection.conflict_type)
                .await
                .map_err(|error| self.as_failure(&error))?;

            let detection_ref = &detection;
            let resolution_options = &options.resolution;
            let resolution = self
                .retry
                .execute("sync:resolve", || async move {
                    self.resolver
                        .resolve_conflict(detection_ref, resolution_options, run_id)
                        .await
                })
                .await?;

            let outcome = self
                .retry
                .execute("store:apply", || {
                    let resolution = resolution.clone();
                    let sku = sku.clone();
                    async move {
                        self.resolver
                            .apply_resolution(&resolution, &sku, run_id)
                            .await
                    }
                })
                .await?;

            let product_outcome = if !outcome.success {
                ProductOutcome::Failed {
                    message: outcome
                        .error_message
                        .unwrap_or_else(|| "resolution apply failed".to_string()),
                }
            } else {
                match resolution.action {
                    ResolutionAction::AcceptedRemote | ResolutionAction::Merged => {
                        ProductOutcome::Updated
                    }
                    _ => ProductOutcome::Skipped,
                }
            };
            self.runs
                .record_product_outcome(run_id, &sku, &product_outcome)
                .await
                .map_err(|error| self.as_failure(&error))?;
            return Ok(());
        }

        // No conflict: skip, update in place, or create from remote
        match (&local, detection.resolution_strategy) {
            (_, crate::models::ResolutionStrategy::SkipSync) => {
                let mut event = ProductSyncEvent::new(
                    run_id,
                    sku.clone(),
                    SyncEventType::Skip,
                    SyncOperation::Save,
                );
                event.product_id = local.as_ref().map(|product| product.id);
                event.skipped_reason = Some("no change detected".to_string());
                event.processing_time_ms = Some(elapsed_ms(started));
                self.record(run_id, &event, &sku, &ProductOutcome::Skipped)
                    .await?;
            }
            (Some(existing), _) => {
                self.update_existing(run_id, existing, remote_product, options, started)
                    .await?;
            }
            (None, _) => {
                self.create_from_remote(run_id, vendor, remote_product, &sku, options, started)
                    .await?;
            }
        }
        Ok(())
    }

    /// Direct update path for unconflicted but changed products.
    async fn update_existing(
        &self,
        run_id: RunId,
        existing: &Product,
        remote_product: &RemoteProduct,
        options: &SyncOptions,
        started: Instant,
    ) -> std::result::Result<(), RetryFailure> {
        let update =
            build_remote_update(existing, remote_product, &options.resolution, &options.fields)
                .map_err(|error| self.as_failure(&error))?;

        let updated = self
            .retry
            .execute("store:update_product", || {
                let update = update.clone();
                async move { self.store.update_product(&existing.id, &update).await }
            })
            .await?;

        let mut event = ProductSyncEvent::new(
            run_id,
            existing.sku.clone(),
            SyncEventType::Update,
            SyncOperation::Save,
        );
        event.product_id = Some(existing.id);
        event.old_hash = existing.content_hash.clone();
        event.new_hash = updated.content_hash.clone();
        event.old_version = Some(existing.sync_version);
        event.new_version = Some(updated.sync_version);
        event.remote_data = serde_json::to_value(remote_product).ok();
        event.processing_time_ms = Some(elapsed_ms(started));
        self.record(run_id, &event, &existing.sku, &ProductOutcome::Updated)
            .await
    }

    /// Create path: a remote product whose SKU has no local counterpart.
    async fn create_from_remote(
        &self,
        run_id: RunId,
        vendor: &Vendor,
        remote_product: &RemoteProduct,
        sku: &str,
        options: &SyncOptions,
        started: Instant,
    ) -> std::result::Result<(), RetryFailure> {
        let product = new_product_from_remote(vendor, remote_product, sku, options)
            .map_err(|error| self.as_failure(&error))?;

        self.retry
            .execute("store:create_product", || {
                let product = product.clone();
                async move { self.store.create_product(&product).await }
            })
            .await?;

        let mut event = ProductSyncEvent::new(
            run_id,
            sku.to_string(),
            SyncEventType::Create,
            SyncOperation::Save,
        );
        event.product_id = Some(product.id);
        event.new_hash = product.content_hash.clone();
        event.new_version = Some(product.sync_version);
        event.remote_data = serde_json::to_value(remote_product).ok();
        event.after_data = serde_json::to_value(&product).ok();
        event.processing_time_ms = Some(elapsed_ms(started));
        self.record(run_id, &event, sku, &ProductOutcome::Created)
            .await
    }

    /// Record an event plus the matching run counter in one step.
    async fn record(
        &self,
        run_id: RunId,
        event: &ProductSyncEvent,
        sku: &str,
        outcome: &ProductOutcome,
    ) -> std::result::Result<(), RetryFailure> {
        self.runs
            .record_event(event)
            .await
            .map_err(|error| self.as_failure(&error))?;
        self.runs
            .record_product_outcome(run_id, sku, outcome)
            .await
            .map_err(|error| self.as_failure(&error))
    }

    /// Capture one product's post-retry failure: error event + failed counter.
    async fn record_product_failure(
        &self,
        run_id: RunId,
        remote_product: &RemoteProduct,
        sku: &str,
        failure: &RetryFailure,
    ) -> Result<()> {
        let mut event =
            ProductSyncEvent::new(run_id, sku, SyncEventType::Error, SyncOperation::Save);
        event.success = false;
        event.error_message = Some(failure.to_string());
        event.error_code = Some(failure.classified.kind.as_str().to_string());
        event.remote_data = serde_json::to_value(remote_product).ok();
        self.runs.record_event(&event).await?;
        self.runs
            .record_product_outcome(
                run_id,
                sku,
                &ProductOutcome::Failed {
                    message: failure.to_string(),
                },
            )
            .await
    }

    /// Wrap a non-retried bookkeeping error in the retry failure shape so the
    /// per-product catch treats it like any other failure.
    fn as_failure(&self, error: &Error) -> RetryFailure {
        RetryFailure {
            classified: crate::sync::retry::classify(error),
            attempts: 1,
            circuit_open: false,
        }
    }
}

/// Vendor ownership heuristic: case-insensitive substring match of the
/// vendor name against product title, vendor field, or tags. Isolated here
/// so a structured vendor link can replace it without touching the pipeline.
fn remote_product_matches_vendor(remote: &RemoteProduct, vendor_name: &str) -> bool {
    let needle = vendor_name.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }

    remote.title.to_lowercase().contains(&needle)
        || remote
            .vendor
            .as_deref()
            .is_some_and(|vendor| vendor.to_lowercase().contains(&needle))
        || remote
            .tag_list()
            .iter()
            .any(|tag| tag.to_lowercase().contains(&needle))
}

/// Build a fresh local product from a remote one (`sync_version = 1`).
fn new_product_from_remote(
    vendor: &Vendor,
    remote: &RemoteProduct,
    sku: &str,
    options: &SyncOptions,
) -> Result<Product> {
    let signatures = signature::compute_product_signatures(remote)?;
    let now = chrono::Utc::now().timestamp_millis();
    let primary = remote.primary_variant();

    Ok(Product {
        id: ProductId::new(),
        vendor_id: vendor.id.clone(),
        sku: sku.to_string(),
        name: remote.title.clone(),
        description: if options.fields.descriptions {
            remote.body_html.clone().unwrap_or_default()
        } else {
            String::new()
        },
        status: crate::models::ProductStatus::from_remote(remote.status.as_deref()),
        price: primary.map_or_else(|| "0.00".to_string(), |variant| variant.price.clone()),
        compare_at_price: primary.and_then(|variant| variant.compare_at_price.clone()),
        inventory: remote
            .variants
            .iter()
            .map(|variant| variant.inventory_quantity.unwrap_or_default())
            .sum(),
        tags: if options.fields.tags {
            remote.tag_list()
        } else {
            Vec::new()
        },
        images: if options.fields.images {
            crate::sync::resolve::local_images_from_remote(remote)
        } else {
            Vec::new()
        },
        variants: if options.fields.variants {
            crate::sync::resolve::local_variants_from_remote(remote)
        } else {
            Vec::new()
        },
        content_hash: Some(signatures.content_hash),
        variants_hash: Some(signatures.variants_hash),
        images_hash: Some(signatures.images_hash),
        last_hashed_at: Some(now),
        sync_version: 1,
        needs_sync: false,
        last_modified_by: Some("sync:remote".to_string()),
        sync_conflict: None,
        last_sync_at: Some(now),
        remote_updated_at: remote.updated_at_ms(),
        created_at: now,
        updated_at: now,
    })
}

/// Apply the configured success policy to a finalized run.
fn evaluate_success(run: &SyncRun, policy: SuccessPolicy) -> bool {
    match policy {
        SuccessPolicy::Lenient => {
            run.products_failed == 0 || (run.products_created + run.products_updated) > 0
        }
        SuccessPolicy::Strict => run.products_failed == 0 && run.errors.is_empty(),
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InventoryItem, RemotePage};
    use crate::sync::retry::{BreakerConfig, RetryConfig};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Scripted remote catalog: pages are served by index, cursors are the
    /// stringified next index.
    struct FakeCatalog {
        pages: Vec<Vec<RemoteProduct>>,
        calls: AtomicU32,
        fail_always: bool,
    }

    impl FakeCatalog {
        fn with_products(products: Vec<RemoteProduct>) -> Self {
            Self {
                pages: vec![products],
                calls: AtomicU32::new(0),
                fail_always: false,
            }
        }

        fn with_pages(pages: Vec<Vec<RemoteProduct>>) -> Self {
            Self {
                pages,
                calls: AtomicU32::new(0),
                fail_always: false,
            }
        }

        fn failing() -> Self {
            Self {
                pages: Vec::new(),
                calls: AtomicU32::new(0),
                fail_always: true,
            }
        }
    }

    impl RemoteCatalog for FakeCatalog {
        async fn get_products(
            &self,
            _batch_size: u32,
            page_cursor: Option<&str>,
        ) -> Result<RemotePage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_always {
                return Err(Error::RemoteApi("remote unreachable".to_string()));
            }

            let index: usize = page_cursor.map_or(0, |cursor| cursor.parse().unwrap());
            let next_cursor = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
            Ok(RemotePage {
                products: self.pages.get(index).cloned().unwrap_or_default(),
                next_cursor,
            })
        }

        async fn get_inventory_items(&self, _ids: &[i64]) -> Result<Vec<InventoryItem>> {
            Ok(Vec::new())
        }
    }

    fn remote_product_at(
        id: i64,
        sku: &str,
        vendor: &str,
        price: &str,
        updated_at: &str,
    ) -> RemoteProduct {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "title": format!("{vendor} Trail Shirt {sku}"),
            "body_html": "<p>Breathable</p>",
            "vendor": vendor,
            "tags": "outdoor",
            "status": "active",
            "variants": [
                {"price": price, "sku": sku, "inventory_quantity": 5, "option1": "M"}
            ],
            "images": [{"src": "https://cdn.example.com/1.jpg", "position": 1}],
            "updated_at": updated_at
        }))
        .unwrap()
    }

    fn remote_product(id: i64, sku: &str, vendor: &str, price: &str) -> RemoteProduct {
        remote_product_at(id, sku, vendor, price, "2024-03-01T12:00:00Z")
    }

    /// An RFC 3339 timestamp comfortably after "now", for scripting remote
    /// edits that postdate a sync in the same test
    fn future_timestamp() -> String {
        (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339()
    }

    async fn store_with_vendor() -> CatalogStore {
        let store = CatalogStore::open_in_memory().await.unwrap();
        store
            .upsert_vendor(&Vendor::new("vendor-1", "Summit Gear", None))
            .await
            .unwrap();
        store
    }

    fn fast_executor() -> RetryExecutor {
        RetryExecutor::new(
            RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                backoff_multiplier: 2.0,
                jitter_factor: 0.0,
            },
            BreakerConfig::default(),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn creates_missing_products_with_version_one() {
        // Scenario D: SKU absent locally
        let store = store_with_vendor().await;
        let remote = FakeCatalog::with_products(vec![remote_product(
            1,
            "TS-1",
            "Summit Gear",
            "10.00",
        )]);
        let engine =
            SyncEngine::with_retry_executor(store.clone(), remote, fast_executor());

        let report = engine
            .sync_products("vendor-1", "job-1", &SyncOptions::default())
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.run.status, SyncRunStatus::Completed);
        assert_eq!(report.run.products_found, 1);
        assert_eq!(report.run.products_created, 1);
        assert_eq!(report.run.products_failed, 0);

        let product = store.get_product_by_sku("TS-1").await.unwrap().unwrap();
        assert_eq!(product.sync_version, 1);
        assert_eq!(product.price, "10.00");
        assert!(product.content_hash.is_some());

        let events = store.list_events(report.run.run_id, 50).await.unwrap();
        assert!(events
            .iter()
            .any(|event| event.event_type == SyncEventType::Create && event.success));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn second_run_over_unchanged_catalog_is_all_skips() {
        // Idempotence: a re-run with no remote changes writes nothing
        let store = store_with_vendor().await;
        let products = vec![remote_product(1, "TS-1", "Summit Gear", "10.00")];

        let engine = SyncEngine::with_retry_executor(
            store.clone(),
            FakeCatalog::with_products(products.clone()),
            fast_executor(),
        );
        engine
            .sync_products("vendor-1", "job-1", &SyncOptions::default())
            .await
            .unwrap();
        let after_first = store.get_product_by_sku("TS-1").await.unwrap().unwrap();

        let report = engine
            .sync_products("vendor-1", "job-1", &SyncOptions::default())
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.run.products_skipped, 1);
        assert_eq!(report.run.products_created, 0);
        assert_eq!(report.run.products_updated, 0);

        let after_second = store.get_product_by_sku("TS-1").await.unwrap().unwrap();
        assert_eq!(after_second.sync_version, after_first.sync_version);
        assert_eq!(after_second.updated_at, after_first.updated_at);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remote_price_change_updates_and_bumps_version() {
        // Scenario B: remote variant price 10.00 → 12.00
        let store = store_with_vendor().await;

        let engine = SyncEngine::with_retry_executor(
            store.clone(),
            FakeCatalog::with_products(vec![remote_product(1, "TS-1", "Summit Gear", "10.00")]),
            fast_executor(),
        );
        engine
            .sync_products("vendor-1", "job-1", &SyncOptions::default())
            .await
            .unwrap();

        let engine = SyncEngine::with_retry_executor(
            store.clone(),
            FakeCatalog::with_products(vec![remote_product_at(
                1,
                "TS-1",
                "Summit Gear",
                "12.00",
                &future_timestamp(),
            )]),
            fast_executor(),
        );
        let report = engine
            .sync_products("vendor-1", "job-2", &SyncOptions::default())
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.run.products_updated, 1);
        assert_eq!(report.run.conflicts.len(), 1);

        let product = store.get_product_by_sku("TS-1").await.unwrap().unwrap();
        assert_eq!(product.price, "12.00");
        assert_eq!(product.sync_version, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dry_run_classifies_but_writes_nothing() {
        let store = store_with_vendor().await;
        let engine = SyncEngine::with_retry_executor(
            store.clone(),
            FakeCatalog::with_products(vec![remote_product(1, "TS-1", "Summit Gear", "10.00")]),
            fast_executor(),
        );

        let options = SyncOptions {
            dry_run: true,
            ..Default::default()
        };
        let report = engine
            .sync_products("vendor-1", "job-1", &options)
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.run.products_skipped, 1);
        assert!(store.get_product_by_sku("TS-1").await.unwrap().is_none());

        let events = store.list_events(report.run.run_id, 50).await.unwrap();
        assert!(events.iter().any(|event| {
            event.skipped_reason.as_deref() == Some(DRY_RUN_REASON)
        }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn vendor_filter_drops_unrelated_products() {
        let store = store_with_vendor().await;
        let engine = SyncEngine::with_retry_executor(
            store.clone(),
            FakeCatalog::with_products(vec![
                remote_product(1, "TS-1", "Summit Gear", "10.00"),
                remote_product(2, "OB-1", "Other Brand", "20.00"),
            ]),
            fast_executor(),
        );

        let report = engine
            .sync_products("vendor-1", "job-1", &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(report.run.products_found, 1);
        assert!(store.get_product_by_sku("OB-1").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pages_until_cursor_runs_out() {
        let store = store_with_vendor().await;
        let engine = SyncEngine::with_retry_executor(
            store.clone(),
            FakeCatalog::with_pages(vec![
                vec![remote_product(1, "TS-1", "Summit Gear", "10.00")],
                vec![remote_product(2, "TS-2", "Summit Gear", "11.00")],
                vec![remote_product(3, "TS-3", "Summit Gear", "12.00")],
            ]),
            fast_executor(),
        );

        let report = engine
            .sync_products("vendor-1", "job-1", &SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(report.run.products_found, 3);
        assert_eq!(report.run.products_created, 3);
        assert_eq!(report.run.api_calls_made, 3);
        assert!(report.run.avg_response_ms >= 0.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn max_pages_bounds_pagination() {
        let store = store_with_vendor().await;
        let engine = SyncEngine::with_retry_executor(
            store.clone(),
            FakeCatalog::with_pages(vec![
                vec![remote_product(1, "TS-1", "Summit Gear", "10.00")],
                vec![remote_product(2, "TS-2", "Summit Gear", "11.00")],
            ]),
            fast_executor(),
        );

        let options = SyncOptions {
            max_pages: 1,
            ..Default::default()
        };
        let report = engine
            .sync_products("vendor-1", "job-1", &options)
            .await
            .unwrap();

        assert_eq!(report.run.products_found, 1);
        assert!(report
            .run
            .warnings
            .iter()
            .any(|warning| warning.contains("max_pages")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_vendor_fails_before_any_run() {
        let store = CatalogStore::open_in_memory().await.unwrap();
        let engine = SyncEngine::with_retry_executor(
            store.clone(),
            FakeCatalog::with_products(Vec::new()),
            fast_executor(),
        );

        let result = engine
            .sync_products("ghost", "job-1", &SyncOptions::default())
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(store.list_runs(10, 0).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unimplemented_directions_fail_fast_with_finalized_run() {
        let store = store_with_vendor().await;
        let engine = SyncEngine::with_retry_executor(
            store.clone(),
            FakeCatalog::with_products(Vec::new()),
            fast_executor(),
        );

        for direction in [SyncDirection::LocalToRemote, SyncDirection::Bidirectional] {
            let options = SyncOptions {
                direction,
                ..Default::default()
            };
            let result = engine.sync_products("vendor-1", "job-1", &options).await;
            assert!(matches!(result, Err(Error::Unsupported(_))));
        }

        let runs = store.list_runs(10, 0).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs
            .iter()
            .all(|run| run.status == SyncRunStatus::Failed && run.completed_at.is_some()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn catastrophic_fetch_fails_run_but_finalizes_it() {
        let store = store_with_vendor().await;
        let engine = SyncEngine::with_retry_executor(
            store.clone(),
            FakeCatalog::failing(),
            fast_executor(),
        );

        let report = engine
            .sync_products("vendor-1", "job-1", &SyncOptions::default())
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.run.status, SyncRunStatus::Failed);
        assert!(report.run.completed_at.is_some());
        assert!(!report.run.errors.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retry_creates_new_run_with_lineage() {
        let store = store_with_vendor().await;
        let engine = SyncEngine::with_retry_executor(
            store.clone(),
            FakeCatalog::failing(),
            fast_executor(),
        );

        let failed = engine
            .sync_products("vendor-1", "job-1", &SyncOptions::default())
            .await
            .unwrap();
        assert!(!failed.success);

        // The remote recovered; retry under a fresh run id
        let engine = SyncEngine::with_retry_executor(
            store.clone(),
            FakeCatalog::with_products(vec![remote_product(1, "TS-1", "Summit Gear", "10.00")]),
            fast_executor(),
        );
        let retried = engine
            .retry_sync(failed.run.run_id, &SyncOptions::default())
            .await
            .unwrap();

        assert!(retried.success);
        assert_ne!(retried.run.run_id, failed.run.run_id);
        assert_eq!(retried.run.retried_from_run_id, Some(failed.run.run_id));
        assert_eq!(retried.run.sync_job_id, failed.run.sync_job_id);
        assert_eq!(retried.run.products_created, 1);
    }

    #[test]
    fn vendor_matching_is_case_insensitive_substring() {
        let product = remote_product(1, "TS-1", "Summit Gear", "10.00");
        assert!(remote_product_matches_vendor(&product, "summit gear"));
        assert!(remote_product_matches_vendor(&product, "SUMMIT"));
        assert!(!remote_product_matches_vendor(&product, "Other Brand"));
        assert!(!remote_product_matches_vendor(&product, "  "));

        // Tag match without title/vendor match
        let mut tagged = remote_product(2, "TS-2", "Someone Else", "10.00");
        tagged.title = "Generic Shirt".to_string();
        tagged.tags = Some("summit gear, outdoor".to_string());
        assert!(remote_product_matches_vendor(&tagged, "Summit Gear"));
    }

    #[test]
    fn success_policy_lenient_vs_strict() {
        let mut run = SyncRun::new(StartRunParams {
            sync_job_id: "job-1".to_string(),
            vendor_id: "vendor-1".to_string(),
            store_id: None,
            direction: SyncDirection::RemoteToLocal,
            batch_size: 50,
            parent_run_id: None,
            retried_from_run_id: None,
        });
        run.products_created = 2;
        run.products_failed = 1;
        run.errors.push("one failed".to_string());

        // Partial success: lenient passes, strict does not
        assert!(evaluate_success(&run, SuccessPolicy::Lenient));
        assert!(!evaluate_success(&run, SuccessPolicy::Strict));

        run.products_failed = 0;
        run.errors.clear();
        assert!(evaluate_success(&run, SuccessPolicy::Strict));
    }
}
