//! Vendor model

use serde::{Deserialize, Serialize};

/// A vendor whose products are synchronized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    /// Caller-assigned identifier (slug or external id)
    pub id: String,
    /// Display name; also used for remote product matching
    pub name: String,
    /// Remote store this vendor belongs to, when known
    pub store_id: Option<String>,
    pub created_at: i64,
}

impl Vendor {
    /// Create a new vendor record
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, store_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            store_id,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
