//! Append-only per-product sync event ledger

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::sync_run::RunId;
use super::ProductId;

/// A unique identifier for a sync event (UUID v7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// What happened to the product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncEventType {
    Create,
    Update,
    Skip,
    Error,
    Conflict,
}

impl SyncEventType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Skip => "skip",
            Self::Error => "error",
            Self::Conflict => "conflict",
        }
    }
}

impl FromStr for SyncEventType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "skip" => Ok(Self::Skip),
            "error" => Ok(Self::Error),
            "conflict" => Ok(Self::Conflict),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown sync event type: {other}"
            ))),
        }
    }
}

/// Which pipeline stage produced the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    Fetch,
    Compare,
    Hash,
    Save,
    Upload,
}

impl SyncOperation {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Compare => "compare",
            Self::Hash => "hash",
            Self::Save => "save",
            Self::Upload => "upload",
        }
    }
}

impl FromStr for SyncOperation {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fetch" => Ok(Self::Fetch),
            "compare" => Ok(Self::Compare),
            "hash" => Ok(Self::Hash),
            "save" => Ok(Self::Save),
            "upload" => Ok(Self::Upload),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown sync operation: {other}"
            ))),
        }
    }
}

/// One append-only audit record for a product within a run.
///
/// Events are never mutated or deleted after creation; every terminal event
/// carries an explicit `success` flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSyncEvent {
    pub id: EventId,
    pub sync_run_id: RunId,
    pub product_id: Option<ProductId>,
    pub sku: String,
    pub event_type: SyncEventType,
    pub operation: SyncOperation,
    pub old_hash: Option<String>,
    pub new_hash: Option<String>,
    pub old_version: Option<i64>,
    pub new_version: Option<i64>,
    pub changed_fields: Vec<String>,
    pub before_data: Option<serde_json::Value>,
    pub after_data: Option<serde_json::Value>,
    pub remote_data: Option<serde_json::Value>,
    pub success: bool,
    pub error_message: Option<String>,
    pub error_code: Option<String>,
    pub conflict_reason: Option<String>,
    pub skipped_reason: Option<String>,
    pub processing_time_ms: Option<i64>,
    pub created_at: i64,
}

impl ProductSyncEvent {
    /// Start a new event record for a run/SKU pair; everything else defaults
    #[must_use]
    pub fn new(
        sync_run_id: RunId,
        sku: impl Into<String>,
        event_type: SyncEventType,
        operation: SyncOperation,
    ) -> Self {
        Self {
            id: EventId::new(),
            sync_run_id,
            product_id: None,
            sku: sku.into(),
            event_type,
            operation,
            old_hash: None,
            new_hash: None,
            old_version: None,
            new_version: None,
            changed_fields: Vec::new(),
            before_data: None,
            after_data: None,
            remote_data: None,
            success: true,
            error_message: None,
            error_code: None,
            conflict_reason: None,
            skipped_reason: None,
            processing_time_ms: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_defaults() {
        let run_id = RunId::new();
        let event = ProductSyncEvent::new(
            run_id,
            "SKU-1",
            SyncEventType::Skip,
            SyncOperation::Compare,
        );
        assert_eq!(event.sync_run_id, run_id);
        assert_eq!(event.sku, "SKU-1");
        assert!(event.success);
        assert!(event.changed_fields.is_empty());
    }

    #[test]
    fn test_event_type_round_trip() {
        for event_type in [
            SyncEventType::Create,
            SyncEventType::Update,
            SyncEventType::Skip,
            SyncEventType::Error,
            SyncEventType::Conflict,
        ] {
            let parsed: SyncEventType = event_type.as_str().parse().unwrap();
            assert_eq!(parsed, event_type);
        }
    }

    #[test]
    fn test_operation_round_trip() {
        for operation in [
            SyncOperation::Fetch,
            SyncOperation::Compare,
            SyncOperation::Hash,
            SyncOperation::Save,
            SyncOperation::Upload,
        ] {
            let parsed: SyncOperation = operation.as_str().parse().unwrap();
            assert_eq!(parsed, operation);
        }
    }
}
