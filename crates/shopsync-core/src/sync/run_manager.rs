//! Sync run lifecycle and the append-only event ledger.

use crate::models::{
    ConflictType, ProductSyncEvent, RunId, StartRunParams, SyncRun, SyncRunStatus,
};
use crate::services::CatalogStore;
use crate::{Error, Result};

/// Per-product outcome folded into a run's counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductOutcome {
    Created,
    Updated,
    Skipped,
    Failed { message: String },
}

/// Owns the lifecycle and lineage of sync runs.
///
/// Every mutation loads the run row, checks the state machine, and saves it
/// back; events only ever append.
#[derive(Clone)]
pub struct SyncRunManager {
    store: CatalogStore,
}

impl SyncRunManager {
    /// Create a run manager backed by the given store
    #[must_use]
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }

    /// Start a new run: a fresh unique run id, persisted `pending` and
    /// immediately moved to `running`.
    pub async fn start_sync_run(&self, params: StartRunParams) -> Result<SyncRun> {
        let mut run = SyncRun::new(params);
        self.store.create_run(&run).await?;

        run.status = SyncRunStatus::Running;
        self.store.save_run(&run).await?;
        tracing::info!(
            run_id = %run.run_id,
            vendor_id = %run.vendor_id,
            direction = run.direction.as_str(),
            "sync run started"
        );
        Ok(run)
    }

    /// Start a retry of a prior run.
    ///
    /// The retry is a brand-new run (fresh id) carrying `retried_from_run_id`;
    /// the old id is never reused.
    pub async fn start_retry_run(&self, retried_from: RunId) -> Result<SyncRun> {
        let parent = self
            .store
            .get_run(retried_from)
            .await?
            .ok_or_else(|| Error::NotFound(format!("sync run {retried_from}")))?;

        self.start_sync_run(StartRunParams {
            sync_job_id: parent.sync_job_id.clone(),
            vendor_id: parent.vendor_id.clone(),
            store_id: parent.store_id.clone(),
            direction: parent.direction,
            batch_size: parent.batch_size,
            parent_run_id: parent.parent_run_id,
            retried_from_run_id: Some(parent.run_id),
        })
        .await
    }

    /// Record how many products the remote catalog yielded for this run
    pub async fn set_products_found(&self, run_id: RunId, found: u64) -> Result<()> {
        let mut run = self.load_open_run(run_id).await?;
        run.products_found = found;
        self.store.save_run(&run).await
    }

    /// Fold one remote API call into the run's counters and rolling average
    pub async fn record_api_call(
        &self,
        run_id: RunId,
        response_ms: u64,
        rate_limited: bool,
    ) -> Result<()> {
        let mut run = self.load_open_run(run_id).await?;
        run.record_api_call(response_ms, rate_limited);
        self.store.save_run(&run).await
    }

    /// Append one event to the run's ledger
    pub async fn record_event(&self, event: &ProductSyncEvent) -> Result<()> {
        self.store.record_event(event).await
    }

    /// Fold one per-product outcome into the run's counters
    pub async fn record_product_outcome(
        &self,
        run_id: RunId,
        sku: &str,
        outcome: &ProductOutcome,
    ) -> Result<()> {
        let mut run = self.load_open_run(run_id).await?;
        run.products_processed += 1;
        match outcome {
            ProductOutcome::Created => run.products_created += 1,
            ProductOutcome::Updated => run.products_updated += 1,
            ProductOutcome::Skipped => run.products_skipped += 1,
            ProductOutcome::Failed { message } => {
                run.products_failed += 1;
                run.errors.push(format!("{sku}: {message}"));
            }
        }
        self.store.save_run(&run).await
    }

    /// Note a detected conflict in the run's conflict list
    pub async fn record_conflict(
        &self,
        run_id: RunId,
        sku: &str,
        conflict_type: ConflictType,
    ) -> Result<()> {
        let mut run = self.load_open_run(run_id).await?;
        run.conflicts.push(format!("{sku}: {}", conflict_type.as_str()));
        self.store.save_run(&run).await
    }

    /// Note a non-fatal warning on the run
    pub async fn record_warning(&self, run_id: RunId, warning: String) -> Result<()> {
        let mut run = self.load_open_run(run_id).await?;
        run.warnings.push(warning);
        self.store.save_run(&run).await
    }

    /// Remember the last page cursor fetched, for diagnostics
    pub async fn set_page_cursor(&self, run_id: RunId, cursor: Option<String>) -> Result<()> {
        let mut run = self.load_open_run(run_id).await?;
        run.page_cursor = cursor;
        self.store.save_run(&run).await
    }

    /// Fetch a run by id
    pub async fn get_run(&self, run_id: RunId) -> Result<Option<SyncRun>> {
        self.store.get_run(run_id).await
    }

    /// Move a run to a terminal state and stamp `completed_at`.
    ///
    /// Fails when the run is already terminal: terminal states never
    /// transition further.
    pub async fn complete_sync_run(
        &self,
        run_id: RunId,
        status: SyncRunStatus,
        error_summary: Option<String>,
    ) -> Result<SyncRun> {
        if !status.is_terminal() {
            return Err(Error::InvalidInput(format!(
                "cannot complete run with non-terminal status '{}'",
                status.as_str()
            )));
        }

        let mut run = self.load_open_run(run_id).await?;
        run.status = status;
        run.completed_at = Some(chrono::Utc::now().timestamp_millis());
        if let Some(summary) = error_summary {
            run.errors.push(summary);
        }
        self.store.save_run(&run).await?;
        tracing::info!(
            run_id = %run.run_id,
            status = status.as_str(),
            processed = run.products_processed,
            failed = run.products_failed,
            "sync run finished"
        );
        Ok(run)
    }

    async fn load_open_run(&self, run_id: RunId) -> Result<SyncRun> {
        let run = self
            .store
            .get_run(run_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("sync run {run_id}")))?;
        if run.status.is_terminal() {
            return Err(Error::Sync(format!(
                "sync run {run_id} is already {}",
                run.status.as_str()
            )));
        }
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncDirection;
    use pretty_assertions::assert_eq;

    fn params() -> StartRunParams {
        StartRunParams {
            sync_job_id: "job-1".to_string(),
            vendor_id: "vendor-1".to_string(),
            store_id: None,
            direction: SyncDirection::RemoteToLocal,
            batch_size: 50,
            parent_run_id: None,
            retried_from_run_id: None,
        }
    }

    async fn manager() -> SyncRunManager {
        SyncRunManager::new(CatalogStore::open_in_memory().await.unwrap())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_moves_run_to_running() {
        let manager = manager().await;
        let run = manager.start_sync_run(params()).await.unwrap();

        assert_eq!(run.status, SyncRunStatus::Running);
        let stored = manager.get_run(run.run_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SyncRunStatus::Running);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn api_call_counters_accumulate() {
        let manager = manager().await;
        let run = manager.start_sync_run(params()).await.unwrap();

        manager
            .record_api_call(run.run_id, 100, false)
            .await
            .unwrap();
        manager
            .record_api_call(run.run_id, 300, true)
            .await
            .unwrap();

        let stored = manager.get_run(run.run_id).await.unwrap().unwrap();
        assert_eq!(stored.api_calls_made, 2);
        assert_eq!(stored.rate_limit_hits, 1);
        assert!((stored.avg_response_ms - 200.0).abs() < 0.01);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn complete_is_terminal() {
        let manager = manager().await;
        let run = manager.start_sync_run(params()).await.unwrap();

        manager
            .set_products_found(run.run_id, 7)
            .await
            .unwrap();
        let finished = manager
            .complete_sync_run(run.run_id, SyncRunStatus::Completed, None)
            .await
            .unwrap();
        assert_eq!(finished.status, SyncRunStatus::Completed);
        assert!(finished.completed_at.is_some());
        assert_eq!(finished.products_found, 7);

        // Terminal runs reject further mutation
        assert!(manager
            .record_api_call(run.run_id, 50, false)
            .await
            .is_err());
        assert!(manager
            .complete_sync_run(run.run_id, SyncRunStatus::Failed, None)
            .await
            .is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn complete_rejects_non_terminal_status() {
        let manager = manager().await;
        let run = manager.start_sync_run(params()).await.unwrap();

        assert!(manager
            .complete_sync_run(run.run_id, SyncRunStatus::Running, None)
            .await
            .is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retry_creates_new_run_with_lineage() {
        let manager = manager().await;
        let original = manager.start_sync_run(params()).await.unwrap();
        manager
            .complete_sync_run(original.run_id, SyncRunStatus::Failed, None)
            .await
            .unwrap();

        let retry = manager.start_retry_run(original.run_id).await.unwrap();
        assert_ne!(retry.run_id, original.run_id);
        assert_eq!(retry.retried_from_run_id, Some(original.run_id));
        assert_eq!(retry.sync_job_id, original.sync_job_id);
        assert_eq!(retry.status, SyncRunStatus::Running);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn product_outcomes_fold_into_counters() {
        let manager = manager().await;
        let run = manager.start_sync_run(params()).await.unwrap();

        manager
            .record_product_outcome(run.run_id, "A-1", &ProductOutcome::Created)
            .await
            .unwrap();
        manager
            .record_product_outcome(run.run_id, "A-2", &ProductOutcome::Updated)
            .await
            .unwrap();
        manager
            .record_product_outcome(
                run.run_id,
                "A-3",
                &ProductOutcome::Failed {
                    message: "persistence failure".to_string(),
                },
            )
            .await
            .unwrap();
        manager
            .record_conflict(run.run_id, "A-2", ConflictType::VariantChange)
            .await
            .unwrap();

        let stored = manager.get_run(run.run_id).await.unwrap().unwrap();
        assert_eq!(stored.products_processed, 3);
        assert_eq!(stored.products_created, 1);
        assert_eq!(stored.products_updated, 1);
        assert_eq!(stored.products_failed, 1);
        assert_eq!(stored.errors, vec!["A-3: persistence failure".to_string()]);
        assert_eq!(stored.conflicts, vec!["A-2: variant_change".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn retry_of_unknown_run_fails() {
        let manager = manager().await;
        assert!(matches!(
            manager.start_retry_run(RunId::new()).await,
            Err(Error::NotFound(_))
        ));
    }
}
