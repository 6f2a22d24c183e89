use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use serde::Serialize;
use shopsync_core::config::RemoteConfig;
use shopsync_core::models::{ManualReviewItem, Product, ProductSyncEvent, SyncRun};
use shopsync_core::remote::ShopifyCatalog;
use shopsync_core::CatalogStore;

use crate::error::CliError;

const DB_FILE_NAME: &str = "shopsync.db";

/// Resolve the database path: explicit flag, then `SHOPSYNC_DB_PATH`, then
/// the platform data directory.
pub fn resolve_db_path(flag: Option<&Path>) -> Result<PathBuf, CliError> {
    if let Some(path) = flag {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = std::env::var("SHOPSYNC_DB_PATH") {
        let path = path.trim();
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let base = dirs::data_dir()
        .ok_or_else(|| CliError::Config("could not determine a data directory".to_string()))?;
    Ok(base.join("shopsync").join(DB_FILE_NAME))
}

/// Open the catalog store at the resolved path.
pub async fn open_store(db_path: &Path) -> Result<CatalogStore, CliError> {
    Ok(CatalogStore::open_path(db_path).await?)
}

/// Build the remote catalog client from the environment.
pub fn build_remote_catalog() -> Result<ShopifyCatalog, CliError> {
    let config = RemoteConfig::from_env().map_err(|_| CliError::RemoteNotConfigured)?;
    Ok(ShopifyCatalog::new(&config)?)
}

/// Format a Unix-ms timestamp for human output.
pub fn format_timestamp(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map_or_else(|| ms.to_string(), |ts| ts.format("%Y-%m-%d %H:%M:%S").to_string())
}

#[derive(Debug, Serialize)]
pub struct RunListItem {
    pub run_id: String,
    pub sync_job_id: String,
    pub vendor_id: String,
    pub direction: String,
    pub status: String,
    pub found: u64,
    pub processed: u64,
    pub created: u64,
    pub updated: u64,
    pub failed: u64,
    pub skipped: u64,
    pub api_calls: u64,
    pub rate_limit_hits: u64,
    pub avg_response_ms: f64,
    pub retried_from: Option<String>,
    pub started_at: i64,
    pub started_at_iso: String,
    pub completed_at: Option<i64>,
}

pub fn run_to_item(run: &SyncRun) -> RunListItem {
    RunListItem {
        run_id: run.run_id.as_str(),
        sync_job_id: run.sync_job_id.clone(),
        vendor_id: run.vendor_id.clone(),
        direction: run.direction.as_str().to_string(),
        status: run.status.as_str().to_string(),
        found: run.products_found,
        processed: run.products_processed,
        created: run.products_created,
        updated: run.products_updated,
        failed: run.products_failed,
        skipped: run.products_skipped,
        api_calls: run.api_calls_made,
        rate_limit_hits: run.rate_limit_hits,
        avg_response_ms: run.avg_response_ms,
        retried_from: run.retried_from_run_id.map(|id| id.as_str()),
        started_at: run.started_at,
        started_at_iso: format_timestamp(run.started_at),
        completed_at: run.completed_at,
    }
}

pub fn format_run_lines(runs: &[SyncRun]) -> Vec<String> {
    runs.iter()
        .map(|run| {
            format!(
                "{}  {}  {:<9}  {}  found={} created={} updated={} skipped={} failed={}",
                run.run_id,
                format_timestamp(run.started_at),
                run.status.as_str(),
                run.vendor_id,
                run.products_found,
                run.products_created,
                run.products_updated,
                run.products_skipped,
                run.products_failed,
            )
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct EventListItem {
    pub id: String,
    pub sku: String,
    pub event_type: String,
    pub operation: String,
    pub success: bool,
    pub old_version: Option<i64>,
    pub new_version: Option<i64>,
    pub changed_fields: Vec<String>,
    pub error_message: Option<String>,
    pub conflict_reason: Option<String>,
    pub skipped_reason: Option<String>,
    pub created_at: i64,
}

pub fn event_to_item(event: &ProductSyncEvent) -> EventListItem {
    EventListItem {
        id: event.id.as_str(),
        sku: event.sku.clone(),
        event_type: event.event_type.as_str().to_string(),
        operation: event.operation.as_str().to_string(),
        success: event.success,
        old_version: event.old_version,
        new_version: event.new_version,
        changed_fields: event.changed_fields.clone(),
        error_message: event.error_message.clone(),
        conflict_reason: event.conflict_reason.clone(),
        skipped_reason: event.skipped_reason.clone(),
        created_at: event.created_at,
    }
}

pub fn format_event_lines(events: &[ProductSyncEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| {
            let detail = event
                .error_message
                .as_deref()
                .or(event.conflict_reason.as_deref())
                .or(event.skipped_reason.as_deref())
                .unwrap_or_default();
            format!(
                "{}  {:<8} {:<8} {:<5} {}  {}",
                format_timestamp(event.created_at),
                event.event_type.as_str(),
                event.operation.as_str(),
                if event.success { "ok" } else { "fail" },
                event.sku,
                detail,
            )
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct ReviewListItem {
    pub id: String,
    pub sku: String,
    pub conflict_type: String,
    pub conflict_details: String,
    pub status: String,
    pub created_at: i64,
    pub created_at_iso: String,
}

pub fn review_to_item(item: &ManualReviewItem) -> ReviewListItem {
    ReviewListItem {
        id: item.id.as_str(),
        sku: item.sku.clone(),
        conflict_type: item.conflict_type.as_str().to_string(),
        conflict_details: item.conflict_details.clone(),
        status: item.status.as_str().to_string(),
        created_at: item.created_at,
        created_at_iso: format_timestamp(item.created_at),
    }
}

pub fn format_review_lines(items: &[ManualReviewItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            format!(
                "{}  {}  {}  {}  {}",
                item.id,
                format_timestamp(item.created_at),
                item.sku,
                item.conflict_type.as_str(),
                item.conflict_details,
            )
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct ProductListItem {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub status: String,
    pub price: String,
    pub inventory: i64,
    pub sync_version: i64,
    pub last_sync_at: Option<i64>,
    pub updated_at: i64,
}

pub fn product_to_item(product: &Product) -> ProductListItem {
    ProductListItem {
        id: product.id.as_str(),
        sku: product.sku.clone(),
        name: product.name.clone(),
        status: product.status.as_str().to_string(),
        price: product.price.clone(),
        inventory: product.inventory,
        sync_version: product.sync_version,
        last_sync_at: product.last_sync_at,
        updated_at: product.updated_at,
    }
}

pub fn format_product_lines(products: &[Product]) -> Vec<String> {
    products
        .iter()
        .map(|product| {
            format!(
                "{:<20} {:<9} v{:<3} {:>10}  inv={:<5} {}",
                product.sku,
                product.status.as_str(),
                product.sync_version,
                product.price,
                product.inventory,
                product.name,
            )
        })
        .collect()
}
