//! Shared catalog store wrapper used by the engine and clients.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    Database, LibSqlProductRepository, LibSqlReviewRepository, LibSqlSyncRunRepository,
    LibSqlVendorRepository, ProductRepository, ReviewRepository, SyncRunRepository,
    VendorRepository,
};
use crate::models::{
    ManualReviewItem, Product, ProductId, ProductSyncEvent, ProductUpdate, ReviewId, RunId,
    SyncRun, Vendor,
};
use crate::Result;

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct CatalogStore {
    db: Arc<Mutex<Database>>,
}

impl CatalogStore {
    /// Open a catalog store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory catalog store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    // --- Vendors ---

    /// Fetch a vendor by id.
    pub async fn get_vendor(&self, id: &str) -> Result<Option<Vendor>> {
        let db = self.db.lock().await;
        let repo = LibSqlVendorRepository::new(db.connection());
        repo.get(id).await
    }

    /// Insert or update a vendor.
    pub async fn upsert_vendor(&self, vendor: &Vendor) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlVendorRepository::new(db.connection());
        repo.upsert(vendor).await
    }

    /// List all vendors.
    pub async fn list_vendors(&self) -> Result<Vec<Vendor>> {
        let db = self.db.lock().await;
        let repo = LibSqlVendorRepository::new(db.connection());
        repo.list().await
    }

    // --- Products ---

    /// Fetch a product by SKU.
    pub async fn get_product_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let db = self.db.lock().await;
        let repo = LibSqlProductRepository::new(db.connection());
        repo.get_by_sku(sku).await
    }

    /// Fetch a product by id.
    pub async fn get_product(&self, id: &ProductId) -> Result<Option<Product>> {
        let db = self.db.lock().await;
        let repo = LibSqlProductRepository::new(db.connection());
        repo.get(id).await
    }

    /// Insert a new product.
    pub async fn create_product(&self, product: &Product) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlProductRepository::new(db.connection());
        repo.create(product).await
    }

    /// Apply a partial product update.
    pub async fn update_product(&self, id: &ProductId, update: &ProductUpdate) -> Result<Product> {
        let db = self.db.lock().await;
        let repo = LibSqlProductRepository::new(db.connection());
        repo.update(id, update).await
    }

    /// List a vendor's products, most recently updated first.
    pub async fn list_products_for_vendor(
        &self,
        vendor_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Product>> {
        let db = self.db.lock().await;
        let repo = LibSqlProductRepository::new(db.connection());
        repo.list_for_vendor(vendor_id, limit, offset).await
    }

    // --- Sync runs and events ---

    /// Insert a new sync run row.
    pub async fn create_run(&self, run: &SyncRun) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRunRepository::new(db.connection());
        repo.create_run(run).await
    }

    /// Persist the current state of a run.
    pub async fn save_run(&self, run: &SyncRun) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRunRepository::new(db.connection());
        repo.save_run(run).await
    }

    /// Fetch a run by id.
    pub async fn get_run(&self, run_id: RunId) -> Result<Option<SyncRun>> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRunRepository::new(db.connection());
        repo.get_run(run_id).await
    }

    /// List runs, newest first.
    pub async fn list_runs(&self, limit: usize, offset: usize) -> Result<Vec<SyncRun>> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRunRepository::new(db.connection());
        repo.list_runs(limit, offset).await
    }

    /// Append one event to the ledger.
    pub async fn record_event(&self, event: &ProductSyncEvent) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRunRepository::new(db.connection());
        repo.record_event(event).await
    }

    /// List a run's events in append order.
    pub async fn list_events(&self, run_id: RunId, limit: usize) -> Result<Vec<ProductSyncEvent>> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncRunRepository::new(db.connection());
        repo.list_events(run_id, limit).await
    }

    // --- Manual review queue ---

    /// Append a pending review item.
    pub async fn enqueue_review(&self, item: &ManualReviewItem) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlReviewRepository::new(db.connection());
        repo.enqueue(item).await
    }

    /// Fetch a review item by id.
    pub async fn get_review(&self, id: ReviewId) -> Result<Option<ManualReviewItem>> {
        let db = self.db.lock().await;
        let repo = LibSqlReviewRepository::new(db.connection());
        repo.get(id).await
    }

    /// List pending review items, oldest first.
    pub async fn list_pending_reviews(&self, limit: usize) -> Result<Vec<ManualReviewItem>> {
        let db = self.db.lock().await;
        let repo = LibSqlReviewRepository::new(db.connection());
        repo.list_pending(limit).await
    }

    /// Mark a pending review item resolved.
    pub async fn mark_review_resolved(&self, id: ReviewId) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlReviewRepository::new(db.connection());
        repo.mark_resolved(id).await
    }

    /// Expire pending review items created before the cutoff.
    pub async fn expire_reviews_older_than(&self, cutoff_ms: i64) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlReviewRepository::new(db.connection());
        repo.expire_older_than(cutoff_ms).await
    }
}
