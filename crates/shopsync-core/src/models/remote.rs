//! Wire types for the remote catalog's Admin REST API

use serde::{Deserialize, Serialize};

use crate::util::parse_rfc3339_ms;

/// A product as returned by the remote catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProduct {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    /// Comma-separated tag list, as the API sends it
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub variants: Vec<RemoteVariant>,
    #[serde(default)]
    pub images: Vec<RemoteImage>,
    /// RFC 3339 timestamp of the last remote modification
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl RemoteProduct {
    /// SKU of the primary (first) variant, if present and non-empty
    #[must_use]
    pub fn primary_sku(&self) -> Option<&str> {
        self.variants
            .first()
            .and_then(|variant| variant.sku.as_deref())
            .map(str::trim)
            .filter(|sku| !sku.is_empty())
    }

    /// Primary (first) variant
    #[must_use]
    pub fn primary_variant(&self) -> Option<&RemoteVariant> {
        self.variants.first()
    }

    /// Tags split on commas, trimmed, empties removed
    #[must_use]
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    /// Remote modification time as Unix milliseconds
    #[must_use]
    pub fn updated_at_ms(&self) -> Option<i64> {
        parse_rfc3339_ms(self.updated_at.as_deref())
    }
}

/// A product variant as returned by the remote catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteVariant {
    #[serde(default)]
    pub id: Option<i64>,
    pub price: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
    #[serde(default)]
    pub compare_at_price: Option<String>,
    #[serde(default)]
    pub option1: Option<String>,
    #[serde(default)]
    pub option2: Option<String>,
    #[serde(default)]
    pub option3: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub inventory_item_id: Option<i64>,
}

impl RemoteVariant {
    /// Option values in option1..option3 order, skipping unset slots
    #[must_use]
    pub fn option_values(&self) -> Vec<String> {
        [&self.option1, &self.option2, &self.option3]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

/// A product image as returned by the remote catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteImage {
    pub src: String,
    #[serde(default)]
    pub position: Option<i64>,
}

/// One page of remote products plus the cursor for the next page
#[derive(Debug, Clone, Default)]
pub struct RemotePage {
    pub products: Vec<RemoteProduct>,
    /// Opaque cursor; `None` when this is the last page
    pub next_cursor: Option<String>,
}

/// An inventory item with unit cost, fetched separately from products
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: i64,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub cost: Option<String>,
    #[serde(default)]
    pub tracked: Option<bool>,
}
