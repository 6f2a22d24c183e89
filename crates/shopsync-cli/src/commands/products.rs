use std::path::Path;

use crate::commands::common::{
    format_product_lines, open_store, product_to_item, ProductListItem,
};
use crate::error::CliError;

pub async fn run_products_list(
    vendor: &str,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let products = store.list_products_for_vendor(vendor, limit, 0).await?;

    if as_json {
        let items: Vec<ProductListItem> = products.iter().map(product_to_item).collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if products.is_empty() {
        println!("No products stored for vendor {vendor}.");
        return Ok(());
    }
    for line in format_product_lines(&products) {
        println!("{line}");
    }
    Ok(())
}
