//! Signature hashing for cheap change detection.
//!
//! Signatures are SHA-256 digests over canonical JSON serializations of
//! normalized field subsets. Serialization goes through structs with a fixed
//! field order, so identical input always yields identical hashes.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::models::{Product, ProductStatus, RemoteProduct};
use crate::Result;

/// The three component digests of a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSignatures {
    pub content_hash: String,
    pub variants_hash: String,
    pub images_hash: String,
}

/// Hashes currently stored on a local product, if any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredSignatures {
    pub content_hash: Option<String>,
    pub variants_hash: Option<String>,
    pub images_hash: Option<String>,
}

impl From<&Product> for StoredSignatures {
    fn from(product: &Product) -> Self {
        Self {
            content_hash: product.content_hash.clone(),
            variants_hash: product.variants_hash.clone(),
            images_hash: product.images_hash.clone(),
        }
    }
}

/// Which signature components differ from the stored hashes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeReport {
    pub has_changed: bool,
    /// Component names in check order: "content", "variants", "images"
    pub changed_components: Vec<String>,
}

#[derive(Serialize)]
struct ContentSubset<'a> {
    title: &'a str,
    body_html: &'a str,
    tags: Vec<String>,
    status: &'a str,
}

#[derive(Serialize)]
struct VariantSubset<'a> {
    price: &'a str,
    sku: Option<&'a str>,
    barcode: Option<&'a str>,
    inventory_quantity: i64,
    compare_at_price: Option<&'a str>,
    options: Vec<String>,
}

/// Compute the three signature hashes for a remote product.
pub fn compute_product_signatures(remote: &RemoteProduct) -> Result<ProductSignatures> {
    let content = ContentSubset {
        title: &remote.title,
        body_html: remote.body_html.as_deref().unwrap_or_default(),
        tags: remote.tag_list(),
        status: ProductStatus::from_remote(remote.status.as_deref()).as_str(),
    };

    let variants: Vec<VariantSubset<'_>> = remote
        .variants
        .iter()
        .map(|variant| VariantSubset {
            price: &variant.price,
            sku: variant.sku.as_deref(),
            barcode: variant.barcode.as_deref(),
            inventory_quantity: variant.inventory_quantity.unwrap_or_default(),
            compare_at_price: variant.compare_at_price.as_deref(),
            options: variant.option_values(),
        })
        .collect();

    let images: Vec<&str> = remote.images.iter().map(|image| image.src.as_str()).collect();

    Ok(ProductSignatures {
        content_hash: digest(&content)?,
        variants_hash: digest(&variants)?,
        images_hash: digest(&images)?,
    })
}

/// Compare fresh signatures against stored ones and name what differs.
///
/// A missing stored hash counts as changed: the product was never hashed.
pub fn has_product_changed(
    remote: &RemoteProduct,
    stored: &StoredSignatures,
) -> Result<ChangeReport> {
    let fresh = compute_product_signatures(remote)?;
    let mut changed_components = Vec::new();

    if stored.content_hash.as_deref() != Some(fresh.content_hash.as_str()) {
        changed_components.push("content".to_string());
    }
    if stored.variants_hash.as_deref() != Some(fresh.variants_hash.as_str()) {
        changed_components.push("variants".to_string());
    }
    if stored.images_hash.as_deref() != Some(fresh.images_hash.as_str()) {
        changed_components.push("images".to_string());
    }

    Ok(ChangeReport {
        has_changed: !changed_components.is_empty(),
        changed_components,
    })
}

fn digest<T: Serialize>(value: &T) -> Result<String> {
    let serialized = serde_json::to_vec(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&serialized);
    Ok(hex::encode(hasher.finalize()))
}
