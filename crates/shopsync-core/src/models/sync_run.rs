//! Sync run model and lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A globally unique sync run identifier (UUID v7, time-sortable).
///
/// The run id is the idempotency anchor for one sync invocation. It is never
/// reused: a retry creates a new run that references the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a fresh unique run ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Sync run lifecycle state
///
/// `pending → running → {completed|failed|cancelled}`; terminal states never
/// transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SyncRunStatus {
    /// Stable string form used in the database
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// True once the run can no longer transition
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl FromStr for SyncRunStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown sync run status: {other}"
            ))),
        }
    }
}

/// Direction of a sync invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    RemoteToLocal,
    LocalToRemote,
    Bidirectional,
}

impl SyncDirection {
    /// Stable string form used in the database
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteToLocal => "remote_to_local",
            Self::LocalToRemote => "local_to_remote",
            Self::Bidirectional => "bidirectional",
        }
    }
}

impl FromStr for SyncDirection {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote_to_local" => Ok(Self::RemoteToLocal),
            "local_to_remote" => Ok(Self::LocalToRemote),
            "bidirectional" => Ok(Self::Bidirectional),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown sync direction: {other}"
            ))),
        }
    }
}

/// One sync invocation and its aggregate outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub run_id: RunId,
    /// Parent grouping for related runs
    pub sync_job_id: String,
    pub vendor_id: String,
    pub store_id: Option<String>,
    pub direction: SyncDirection,
    pub batch_size: u32,
    /// Cursor of the last page fetched, for diagnostics
    pub page_cursor: Option<String>,
    pub status: SyncRunStatus,
    pub products_found: u64,
    pub products_processed: u64,
    pub products_created: u64,
    pub products_updated: u64,
    pub products_failed: u64,
    pub products_skipped: u64,
    pub api_calls_made: u64,
    pub rate_limit_hits: u64,
    /// Rolling average remote response time in milliseconds
    pub avg_response_ms: f64,
    pub errors: Vec<String>,
    pub conflicts: Vec<String>,
    pub warnings: Vec<String>,
    /// Run that spawned this one, when part of a continuation chain
    pub parent_run_id: Option<RunId>,
    /// Run this one retries, when created via retry
    pub retried_from_run_id: Option<RunId>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

/// Parameters for starting a new sync run
#[derive(Debug, Clone)]
pub struct StartRunParams {
    pub sync_job_id: String,
    pub vendor_id: String,
    pub store_id: Option<String>,
    pub direction: SyncDirection,
    pub batch_size: u32,
    pub parent_run_id: Option<RunId>,
    pub retried_from_run_id: Option<RunId>,
}

impl SyncRun {
    /// Create a fresh pending run with a new unique run id
    #[must_use]
    pub fn new(params: StartRunParams) -> Self {
        Self {
            run_id: RunId::new(),
            sync_job_id: params.sync_job_id,
            vendor_id: params.vendor_id,
            store_id: params.store_id,
            direction: params.direction,
            batch_size: params.batch_size,
            page_cursor: None,
            status: SyncRunStatus::Pending,
            products_found: 0,
            products_processed: 0,
            products_created: 0,
            products_updated: 0,
            products_failed: 0,
            products_skipped: 0,
            api_calls_made: 0,
            rate_limit_hits: 0,
            avg_response_ms: 0.0,
            errors: Vec::new(),
            conflicts: Vec::new(),
            warnings: Vec::new(),
            parent_run_id: params.parent_run_id,
            retried_from_run_id: params.retried_from_run_id,
            started_at: chrono::Utc::now().timestamp_millis(),
            completed_at: None,
        }
    }

    /// Fold one remote API call into the counters and rolling average
    pub fn record_api_call(&mut self, response_ms: u64, rate_limited: bool) {
        self.api_calls_made += 1;
        if rate_limited {
            self.rate_limit_hits += 1;
        }
        #[allow(clippy::cast_precision_loss)]
        let sample = response_ms as f64;
        #[allow(clippy::cast_precision_loss)]
        let calls = self.api_calls_made as f64;
        self.avg_response_ms += (sample - self.avg_response_ms) / calls;
    }
}
