use std::path::Path;

use serde::Serialize;
use shopsync_core::models::Vendor;

use crate::commands::common::{format_timestamp, open_store};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct VendorListItem {
    pub id: String,
    pub name: String,
    pub store_id: Option<String>,
    pub created_at: i64,
}

pub async fn run_vendor_add(
    id: &str,
    name: &str,
    store_id: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let id = id.trim();
    let name = name.trim();
    if id.is_empty() || name.is_empty() {
        return Err(CliError::Config(
            "vendor id and name must not be empty".to_string(),
        ));
    }

    let store = open_store(db_path).await?;
    store
        .upsert_vendor(&Vendor::new(id, name, store_id))
        .await?;
    println!("Vendor {id} saved.");
    Ok(())
}

pub async fn run_vendor_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let vendors = store.list_vendors().await?;

    if as_json {
        let items: Vec<VendorListItem> = vendors
            .iter()
            .map(|vendor| VendorListItem {
                id: vendor.id.clone(),
                name: vendor.name.clone(),
                store_id: vendor.store_id.clone(),
                created_at: vendor.created_at,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if vendors.is_empty() {
        println!("No vendors registered.");
        return Ok(());
    }
    for vendor in &vendors {
        println!(
            "{:<20} {}  added {}",
            vendor.id,
            vendor.name,
            format_timestamp(vendor.created_at)
        );
    }
    Ok(())
}
