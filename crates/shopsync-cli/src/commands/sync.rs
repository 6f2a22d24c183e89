use std::path::Path;

use shopsync_core::models::{RunId, SyncDirection, VendorPriority};
use shopsync_core::sync::{
    ConflictDetectionOptions, FieldToggles, ResolutionOptions, SuccessPolicy, SyncEngine,
    SyncOptions, SyncReport,
};

use crate::cli::{DirectionArg, PriorityArg};
use crate::commands::common::{
    build_remote_catalog, event_to_item, format_event_lines, format_run_lines, open_store,
    run_to_item, EventListItem,
};
use crate::error::CliError;

/// Options collected from `shopsync sync run` flags
pub struct SyncRunArgs {
    pub vendor: String,
    pub job: Option<String>,
    pub direction: DirectionArg,
    pub batch_size: u32,
    pub max_pages: u32,
    pub dry_run: bool,
    pub vendor_priority: Option<PriorityArg>,
    pub preserve_pricing: bool,
    pub preserve_inventory: bool,
    pub auto_merge: bool,
    pub no_manual_review: bool,
    pub include_unchanged: bool,
    pub strict: bool,
    pub json: bool,
}

impl SyncRunArgs {
    fn to_options(&self) -> SyncOptions {
        let direction = direction_from_arg(self.direction);
        let vendor_priority = self.vendor_priority.map(|priority| match priority {
            PriorityArg::Local => VendorPriority::Local,
            PriorityArg::Remote => VendorPriority::Remote,
        });

        SyncOptions {
            direction,
            batch_size: self.batch_size,
            fields: FieldToggles::default(),
            detection: ConflictDetectionOptions {
                direction,
                vendor_priority,
                enable_auto_merge: self.auto_merge,
                skip_unchanged: !self.include_unchanged,
                ..Default::default()
            },
            resolution: ResolutionOptions {
                vendor_priority,
                auto_merge_enabled: self.auto_merge,
                preserve_local_inventory: self.preserve_inventory,
                preserve_local_pricing: self.preserve_pricing,
                allow_manual_review: !self.no_manual_review,
                ..Default::default()
            },
            max_pages: self.max_pages,
            dry_run: self.dry_run,
            success_policy: if self.strict {
                SuccessPolicy::Strict
            } else {
                SuccessPolicy::Lenient
            },
        }
    }
}

const fn direction_from_arg(arg: DirectionArg) -> SyncDirection {
    match arg {
        DirectionArg::RemoteToLocal => SyncDirection::RemoteToLocal,
        DirectionArg::LocalToRemote => SyncDirection::LocalToRemote,
        DirectionArg::Bidirectional => SyncDirection::Bidirectional,
    }
}

pub async fn run_sync(args: &SyncRunArgs, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let remote = build_remote_catalog()?;
    let engine = SyncEngine::new(store, remote);

    let job_id = args
        .job
        .clone()
        .unwrap_or_else(|| format!("job-{}", uuid_like_job_id()));
    let options = args.to_options();

    let report = engine
        .sync_products(&args.vendor, &job_id, &options)
        .await?;
    print_report(&report, args.json)
}

pub async fn run_retry(run_id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let run_id: RunId = run_id
        .parse()
        .map_err(|_| CliError::InvalidRunId(run_id.to_string()))?;

    let store = open_store(db_path).await?;
    let remote = build_remote_catalog()?;
    let engine = SyncEngine::new(store, remote);

    let report = engine.retry_sync(run_id, &SyncOptions::default()).await?;
    print_report(&report, as_json)
}

pub async fn run_list_runs(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let runs = store.list_runs(limit, 0).await?;

    if as_json {
        let items: Vec<_> = runs.iter().map(run_to_item).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("No sync runs recorded.");
        return Ok(());
    }
    for line in format_run_lines(&runs) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_list_events(
    run_id: &str,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let run_id: RunId = run_id
        .parse()
        .map_err(|_| CliError::InvalidRunId(run_id.to_string()))?;

    let store = open_store(db_path).await?;
    let events = store.list_events(run_id, limit).await?;

    if as_json {
        let items: Vec<EventListItem> = events.iter().map(event_to_item).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("No events recorded for run {run_id}.");
        return Ok(());
    }
    for line in format_event_lines(&events) {
        println!("{line}");
    }
    Ok(())
}

fn print_report(report: &SyncReport, as_json: bool) -> Result<(), CliError> {
    if as_json {
        let payload = serde_json::json!({
            "success": report.success,
            "duration_ms": report.duration_ms,
            "run": run_to_item(&report.run),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    let run = &report.run;
    println!(
        "Run {} {} in {}ms",
        run.run_id,
        if report.success { "succeeded" } else { "failed" },
        report.duration_ms
    );
    println!(
        "  found={} processed={} created={} updated={} skipped={} failed={}",
        run.products_found,
        run.products_processed,
        run.products_created,
        run.products_updated,
        run.products_skipped,
        run.products_failed,
    );
    println!(
        "  api_calls={} rate_limit_hits={} avg_response_ms={:.1}",
        run.api_calls_made, run.rate_limit_hits, run.avg_response_ms
    );
    for conflict in &run.conflicts {
        println!("  conflict: {conflict}");
    }
    for warning in &run.warnings {
        println!("  warning: {warning}");
    }
    for error in &run.errors {
        println!("  error: {error}");
    }
    Ok(())
}

/// Short random-enough job suffix derived from the current time
fn uuid_like_job_id() -> String {
    format!("{:x}", chrono::Utc::now().timestamp_millis())
}
