//! Sync run and event ledger repository implementation

use libsql::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{ProductSyncEvent, RunId, SyncRun};

const RUN_COLUMNS: &str = "run_id, sync_job_id, vendor_id, store_id, direction, batch_size, \
     page_cursor, status, products_found, products_processed, products_created, \
     products_updated, products_failed, products_skipped, api_calls_made, rate_limit_hits, \
     avg_response_ms, errors, conflicts, warnings, parent_run_id, retried_from_run_id, \
     started_at, completed_at";

const EVENT_COLUMNS: &str = "id, sync_run_id, product_id, sku, event_type, operation, \
     old_hash, new_hash, old_version, new_version, changed_fields, before_data, after_data, \
     remote_data, success, error_message, error_code, conflict_reason, skipped_reason, \
     processing_time_ms, created_at";

/// Trait for sync run storage operations (async)
///
/// The run row is mutable and keyed by the unique `run_id`; events are
/// append-only.
#[allow(async_fn_in_trait)]
pub trait SyncRunRepository {
    /// Insert a new run row
    async fn create_run(&self, run: &SyncRun) -> Result<()>;

    /// Persist the current state of a run
    async fn save_run(&self, run: &SyncRun) -> Result<()>;

    /// Get a run by id
    async fn get_run(&self, run_id: RunId) -> Result<Option<SyncRun>>;

    /// List runs, newest first
    async fn list_runs(&self, limit: usize, offset: usize) -> Result<Vec<SyncRun>>;

    /// Append one event to the ledger
    async fn record_event(&self, event: &ProductSyncEvent) -> Result<()>;

    /// List a run's events in append order
    async fn list_events(&self, run_id: RunId, limit: usize) -> Result<Vec<ProductSyncEvent>>;
}

/// libSQL implementation of `SyncRunRepository`
pub struct LibSqlSyncRunRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncRunRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_run(row: &Row) -> Result<SyncRun> {
        let run_id: String = row.get(0)?;
        let direction: String = row.get(4)?;
        let status: String = row.get(7)?;
        let errors: String = row.get(17)?;
        let conflicts: String = row.get(18)?;
        let warnings: String = row.get(19)?;
        let parent_run_id: Option<String> = row.get(20)?;
        let retried_from_run_id: Option<String> = row.get(21)?;

        Ok(SyncRun {
            run_id: parse_run_id(&run_id)?,
            sync_job_id: row.get(1)?,
            vendor_id: row.get(2)?,
            store_id: row.get(3)?,
            direction: direction.parse()?,
            batch_size: u32::try_from(row.get::<i64>(5)?).unwrap_or(u32::MAX),
            page_cursor: row.get(6)?,
            status: status.parse()?,
            products_found: counter(row, 8)?,
            products_processed: counter(row, 9)?,
            products_created: counter(row, 10)?,
            products_updated: counter(row, 11)?,
            products_failed: counter(row, 12)?,
            products_skipped: counter(row, 13)?,
            api_calls_made: counter(row, 14)?,
            rate_limit_hits: counter(row, 15)?,
            avg_response_ms: row.get(16)?,
            errors: serde_json::from_str(&errors)?,
            conflicts: serde_json::from_str(&conflicts)?,
            warnings: serde_json::from_str(&warnings)?,
            parent_run_id: parent_run_id.as_deref().map(parse_run_id).transpose()?,
            retried_from_run_id: retried_from_run_id
                .as_deref()
                .map(parse_run_id)
                .transpose()?,
            started_at: row.get(22)?,
            completed_at: row.get(23)?,
        })
    }

    fn parse_event(row: &Row) -> Result<ProductSyncEvent> {
        let id: String = row.get(0)?;
        let sync_run_id: String = row.get(1)?;
        let product_id: Option<String> = row.get(2)?;
        let event_type: String = row.get(4)?;
        let operation: String = row.get(5)?;
        let changed_fields: String = row.get(10)?;
        let before_data: Option<String> = row.get(11)?;
        let after_data: Option<String> = row.get(12)?;
        let remote_data: Option<String> = row.get(13)?;

        Ok(ProductSyncEvent {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid event id: {id}")))?,
            sync_run_id: parse_run_id(&sync_run_id)?,
            product_id: product_id
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| Error::Database(format!("invalid product id: {value}")))
                })
                .transpose()?,
            sku: row.get(3)?,
            event_type: event_type.parse()?,
            operation: operation.parse()?,
            old_hash: row.get(6)?,
            new_hash: row.get(7)?,
            old_version: row.get(8)?,
            new_version: row.get(9)?,
            changed_fields: serde_json::from_str(&changed_fields)?,
            before_data: before_data.as_deref().map(serde_json::from_str).transpose()?,
            after_data: after_data.as_deref().map(serde_json::from_str).transpose()?,
            remote_data: remote_data.as_deref().map(serde_json::from_str).transpose()?,
            success: row.get::<i32>(14)? != 0,
            error_message: row.get(15)?,
            error_code: row.get(16)?,
            conflict_reason: row.get(17)?,
            skipped_reason: row.get(18)?,
            processing_time_ms: row.get(19)?,
            created_at: row.get(20)?,
        })
    }
}

fn parse_run_id(value: &str) -> Result<RunId> {
    value
        .parse()
        .map_err(|_| Error::Database(format!("invalid run id: {value}")))
}

/// SQLite stores counters as signed integers; negatives never occur
fn counter(row: &Row, index: i32) -> Result<u64> {
    Ok(u64::try_from(row.get::<i64>(index)?).unwrap_or(0))
}

impl SyncRunRepository for LibSqlSyncRunRepository<'_> {
    async fn create_run(&self, run: &SyncRun) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO sync_runs ({RUN_COLUMNS})
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    run.run_id.as_str(),
                    run.sync_job_id.clone(),
                    run.vendor_id.clone(),
                    run.store_id.clone(),
                    run.direction.as_str(),
                    i64::from(run.batch_size),
                    run.page_cursor.clone(),
                    run.status.as_str(),
                    i64::try_from(run.products_found).unwrap_or(i64::MAX),
                    i64::try_from(run.products_processed).unwrap_or(i64::MAX),
                    i64::try_from(run.products_created).unwrap_or(i64::MAX),
                    i64::try_from(run.products_updated).unwrap_or(i64::MAX),
                    i64::try_from(run.products_failed).unwrap_or(i64::MAX),
                    i64::try_from(run.products_skipped).unwrap_or(i64::MAX),
                    i64::try_from(run.api_calls_made).unwrap_or(i64::MAX),
                    i64::try_from(run.rate_limit_hits).unwrap_or(i64::MAX),
                    run.avg_response_ms,
                    serde_json::to_string(&run.errors)?,
                    serde_json::to_string(&run.conflicts)?,
                    serde_json::to_string(&run.warnings)?,
                    run.parent_run_id.map(|id| id.as_str()),
                    run.retried_from_run_id.map(|id| id.as_str()),
                    run.started_at,
                    run.completed_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn save_run(&self, run: &SyncRun) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE sync_runs SET
                    page_cursor = ?, status = ?, products_found = ?, products_processed = ?,
                    products_created = ?, products_updated = ?, products_failed = ?,
                    products_skipped = ?, api_calls_made = ?, rate_limit_hits = ?,
                    avg_response_ms = ?, errors = ?, conflicts = ?, warnings = ?,
                    completed_at = ?
                 WHERE run_id = ?",
                params![
                    run.page_cursor.clone(),
                    run.status.as_str(),
                    i64::try_from(run.products_found).unwrap_or(i64::MAX),
                    i64::try_from(run.products_processed).unwrap_or(i64::MAX),
                    i64::try_from(run.products_created).unwrap_or(i64::MAX),
                    i64::try_from(run.products_updated).unwrap_or(i64::MAX),
                    i64::try_from(run.products_failed).unwrap_or(i64::MAX),
                    i64::try_from(run.products_skipped).unwrap_or(i64::MAX),
                    i64::try_from(run.api_calls_made).unwrap_or(i64::MAX),
                    i64::try_from(run.rate_limit_hits).unwrap_or(i64::MAX),
                    run.avg_response_ms,
                    serde_json::to_string(&run.errors)?,
                    serde_json::to_string(&run.conflicts)?,
                    serde_json::to_string(&run.warnings)?,
                    run.completed_at,
                    run.run_id.as_str(),
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(run.run_id.to_string()));
        }
        Ok(())
    }

    async fn get_run(&self, run_id: RunId) -> Result<Option<SyncRun>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {RUN_COLUMNS} FROM sync_runs WHERE run_id = ?"),
                [run_id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_run(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_runs(&self, limit: usize, offset: usize) -> Result<Vec<SyncRun>> {
        #[allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {RUN_COLUMNS} FROM sync_runs
                     ORDER BY started_at DESC
                     LIMIT ? OFFSET ?"
                ),
                params![limit as i64, offset as i64],
            )
            .await?;

        let mut runs = Vec::new();
        while let Some(row) = rows.next().await? {
            runs.push(Self::parse_run(&row)?);
        }
        Ok(runs)
    }

    async fn record_event(&self, event: &ProductSyncEvent) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO product_sync_events ({EVENT_COLUMNS})
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    event.id.as_str(),
                    event.sync_run_id.as_str(),
                    event.product_id.map(|id| id.as_str()),
                    event.sku.clone(),
                    event.event_type.as_str(),
                    event.operation.as_str(),
                    event.old_hash.clone(),
                    event.new_hash.clone(),
                    event.old_version,
                    event.new_version,
                    serde_json::to_string(&event.changed_fields)?,
                    event
                        .before_data
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    event
                        .after_data
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    event
                        .remote_data
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    i32::from(event.success),
                    event.error_message.clone(),
                    event.error_code.clone(),
                    event.conflict_reason.clone(),
                    event.skipped_reason.clone(),
                    event.processing_time_ms,
                    event.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn list_events(&self, run_id: RunId, limit: usize) -> Result<Vec<ProductSyncEvent>> {
        #[allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM product_sync_events
                     WHERE sync_run_id = ?
                     ORDER BY created_at ASC, id ASC
                     LIMIT ?"
                ),
                params![run_id.as_str(), limit as i64],
            )
            .await?;

        let mut events = Vec::new();
        while let Some(row) = rows.next().await? {
            events.push(Self::parse_event(&row)?);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{
        StartRunParams, SyncDirection, SyncEventType, SyncOperation, SyncRunStatus,
    };
    use pretty_assertions::assert_eq;

    fn params_for(vendor: &str) -> StartRunParams {
        StartRunParams {
            sync_job_id: "job-1".to_string(),
            vendor_id: vendor.to_string(),
            store_id: None,
            direction: SyncDirection::RemoteToLocal,
            batch_size: 50,
            parent_run_id: None,
            retried_from_run_id: None,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_save_get_round_trip() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSyncRunRepository::new(db.connection());

        let mut run = SyncRun::new(params_for("vendor-1"));
        repo.create_run(&run).await.unwrap();

        run.status = SyncRunStatus::Running;
        run.products_found = 3;
        run.record_api_call(120, false);
        run.errors.push("one error".to_string());
        repo.save_run(&run).await.unwrap();

        let fetched = repo.get_run(run.run_id).await.unwrap().unwrap();
        assert_eq!(fetched.status, SyncRunStatus::Running);
        assert_eq!(fetched.products_found, 3);
        assert_eq!(fetched.api_calls_made, 1);
        assert_eq!(fetched.errors, vec!["one error".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_unknown_run_fails() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSyncRunRepository::new(db.connection());

        let run = SyncRun::new(params_for("vendor-1"));
        assert!(matches!(
            repo.save_run(&run).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_retry_lineage_round_trip() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSyncRunRepository::new(db.connection());

        let parent = SyncRun::new(params_for("vendor-1"));
        repo.create_run(&parent).await.unwrap();

        let retry = SyncRun::new(StartRunParams {
            retried_from_run_id: Some(parent.run_id),
            ..params_for("vendor-1")
        });
        repo.create_run(&retry).await.unwrap();

        let fetched = repo.get_run(retry.run_id).await.unwrap().unwrap();
        assert_eq!(fetched.retried_from_run_id, Some(parent.run_id));
        assert_ne!(fetched.run_id, parent.run_id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_events_append_in_order() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSyncRunRepository::new(db.connection());

        let run = SyncRun::new(params_for("vendor-1"));
        repo.create_run(&run).await.unwrap();

        for sku in ["A-1", "A-2", "A-3"] {
            let event = ProductSyncEvent::new(
                run.run_id,
                sku,
                SyncEventType::Skip,
                SyncOperation::Compare,
            );
            repo.record_event(&event).await.unwrap();
        }

        let events = repo.list_events(run.run_id, 10).await.unwrap();
        let skus: Vec<&str> = events.iter().map(|event| event.sku.as_str()).collect();
        assert_eq!(skus, vec!["A-1", "A-2", "A-3"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_runs_newest_first() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSyncRunRepository::new(db.connection());

        let mut first = SyncRun::new(params_for("vendor-1"));
        first.started_at -= 1000;
        repo.create_run(&first).await.unwrap();
        let second = SyncRun::new(params_for("vendor-1"));
        repo.create_run(&second).await.unwrap();

        let runs = repo.list_runs(10, 0).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_id, second.run_id);
    }
}
