//! Manual review queue model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::conflict::ConflictType;

/// A unique identifier for a manual review item (UUID v7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewId(Uuid);

impl ReviewId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ReviewId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReviewId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Review item lifecycle: `pending → resolved`, or `expired` via maintenance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Resolved,
    Expired,
}

impl ReviewStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Expired => "expired",
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "expired" => Ok(Self::Expired),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown review status: {other}"
            ))),
        }
    }
}

/// Caller decision when resolving a review item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    AcceptLocal,
    AcceptRemote,
    Custom,
}

impl FromStr for ReviewDecision {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept_local" => Ok(Self::AcceptLocal),
            "accept_remote" => Ok(Self::AcceptRemote),
            "custom" => Ok(Self::Custom),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown review decision: {other}"
            ))),
        }
    }
}

/// A conflict parked for a human decision.
///
/// Items are durable and FIFO by creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualReviewItem {
    pub id: ReviewId,
    pub sku: String,
    pub conflict_type: ConflictType,
    pub local_data: serde_json::Value,
    pub remote_data: serde_json::Value,
    pub conflict_details: String,
    pub created_at: i64,
    pub status: ReviewStatus,
}

impl ManualReviewItem {
    /// Create a pending review item
    #[must_use]
    pub fn new(
        sku: impl Into<String>,
        conflict_type: ConflictType,
        local_data: serde_json::Value,
        remote_data: serde_json::Value,
        conflict_details: impl Into<String>,
    ) -> Self {
        Self {
            id: ReviewId::new(),
            sku: sku.into(),
            conflict_type,
            local_data,
            remote_data,
            conflict_details: conflict_details.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
            status: ReviewStatus::Pending,
        }
    }
}
