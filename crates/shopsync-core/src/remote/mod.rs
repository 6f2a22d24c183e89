//! Remote catalog access

mod shopify;

pub use shopify::ShopifyCatalog;

use crate::models::{InventoryItem, RemotePage};
use crate::Result;

/// Minimal page/fetch contract for the remote catalog.
///
/// The engine is generic over this trait so tests can script pages without a
/// network.
#[allow(async_fn_in_trait)]
pub trait RemoteCatalog {
    /// Fetch one page of products.
    ///
    /// `page_cursor` is the opaque cursor from the previous page's
    /// `next_cursor`, or `None` for the first page.
    async fn get_products(&self, batch_size: u32, page_cursor: Option<&str>) -> Result<RemotePage>;

    /// Fetch inventory items (with unit cost) by id.
    async fn get_inventory_items(&self, ids: &[i64]) -> Result<Vec<InventoryItem>>;
}
