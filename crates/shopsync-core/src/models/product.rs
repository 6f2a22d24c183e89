//! Local product model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique identifier for a local product, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(Uuid);

impl ProductId {
    /// Create a new unique product ID using UUID v7
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

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProductId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Product visibility status, mirroring the remote catalog's states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Archived,
    Draft,
}

impl ProductStatus {
    /// Map a remote status string; unknown or missing values default to active.
    #[must_use]
    pub fn from_remote(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(status) if status.eq_ignore_ascii_case("archived") => Self::Archived,
            Some(status) if status.eq_ignore_ascii_case("draft") => Self::Draft,
            _ => Self::Active,
        }
    }

    /// Stable string form used in the database
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Draft => "draft",
        }
    }
}

impl FromStr for ProductStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            "draft" => Ok(Self::Draft),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown product status: {other}"
            ))),
        }
    }
}

/// A locally stored product variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub sku: Option<String>,
    /// Price as a decimal string, exactly as the remote catalog sends it
    pub price: String,
    pub compare_at_price: Option<String>,
    pub barcode: Option<String>,
    pub inventory_quantity: i64,
    /// Option values (size, color, ...) in option1..option3 order
    pub options: Vec<String>,
    pub position: i64,
}

/// A locally stored product image reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub src: String,
    pub position: i64,
}

/// A product in the local catalog
///
/// The SKU uniquely identifies at most one local product. The three
/// signature hashes and `last_hashed_at` are always stamped together, and
/// `sync_version` increases by exactly one on every accepted update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub vendor_id: String,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub status: ProductStatus,
    pub price: String,
    pub compare_at_price: Option<String>,
    pub inventory: i64,
    pub tags: Vec<String>,
    pub images: Vec<ProductImage>,
    pub variants: Vec<ProductVariant>,
    pub content_hash: Option<String>,
    pub variants_hash: Option<String>,
    pub images_hash: Option<String>,
    /// When the signature hashes were last recomputed (Unix ms)
    pub last_hashed_at: Option<i64>,
    /// Monotonic version, incremented on every accepted update
    pub sync_version: i64,
    pub needs_sync: bool,
    pub last_modified_by: Option<String>,
    /// Unresolved conflict marker, if any
    pub sync_conflict: Option<String>,
    /// Last successful sync for this product (Unix ms)
    pub last_sync_at: Option<i64>,
    /// The remote catalog's updated_at at last observation (Unix ms)
    pub remote_updated_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Partial update payload produced by conflict resolution.
///
/// Only `Some` fields are written; the repository leaves the rest untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProductStatus>,
    pub price: Option<String>,
    pub compare_at_price: Option<String>,
    pub inventory: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub images: Option<Vec<ProductImage>>,
    pub variants: Option<Vec<ProductVariant>>,
    pub content_hash: Option<String>,
    pub variants_hash: Option<String>,
    pub images_hash: Option<String>,
    pub last_hashed_at: Option<i64>,
    pub sync_version: Option<i64>,
    pub needs_sync: Option<bool>,
    pub last_modified_by: Option<String>,
    pub sync_conflict: Option<Option<String>>,
    pub last_sync_at: Option<i64>,
    pub remote_updated_at: Option<i64>,
}

impl ProductUpdate {
    /// True when the payload writes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
