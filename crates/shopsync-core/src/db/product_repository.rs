//! Product repository implementation

use libsql::{params, Connection, Row, Value};

use crate::error::{Error, Result};
use crate::models::{Product, ProductId, ProductImage, ProductUpdate, ProductVariant};

const PRODUCT_COLUMNS: &str = "id, vendor_id, sku, name, description, status, price, \
     compare_at_price, inventory, tags, images, variants, content_hash, variants_hash, \
     images_hash, last_hashed_at, sync_version, needs_sync, last_modified_by, sync_conflict, \
     last_sync_at, remote_updated_at, created_at, updated_at";

/// Trait for product storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ProductRepository {
    /// Insert a new product; the SKU must not already exist
    async fn create(&self, product: &Product) -> Result<()>;

    /// Get a product by ID
    async fn get(&self, id: &ProductId) -> Result<Option<Product>>;

    /// Get a product by SKU
    async fn get_by_sku(&self, sku: &str) -> Result<Option<Product>>;

    /// Apply a partial update and return the stored product
    async fn update(&self, id: &ProductId, update: &ProductUpdate) -> Result<Product>;

    /// List a vendor's products, most recently updated first
    async fn list_for_vendor(
        &self,
        vendor_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Product>>;
}

/// libSQL implementation of `ProductRepository`
pub struct LibSqlProductRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlProductRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_product(row: &Row) -> Result<Product> {
        let id: String = row.get(0)?;
        let status: String = row.get(5)?;
        let tags: String = row.get(9)?;
        let images: String = row.get(10)?;
        let variants: String = row.get(11)?;

        Ok(Product {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid product id: {id}")))?,
            vendor_id: row.get(1)?,
            sku: row.get(2)?,
            name: row.get(3)?,
            description: row.get(4)?,
            status: status.parse()?,
            price: row.get(6)?,
            compare_at_price: row.get(7)?,
            inventory: row.get(8)?,
            tags: serde_json::from_str(&tags)?,
            images: serde_json::from_str::<Vec<ProductImage>>(&images)?,
            variants: serde_json::from_str::<Vec<ProductVariant>>(&variants)?,
            content_hash: row.get(12)?,
            variants_hash: row.get(13)?,
            images_hash: row.get(14)?,
            last_hashed_at: row.get(15)?,
            sync_version: row.get(16)?,
            needs_sync: row.get::<i32>(17)? != 0,
            last_modified_by: row.get(18)?,
            sync_conflict: row.get(19)?,
            last_sync_at: row.get(20)?,
            remote_updated_at: row.get(21)?,
            created_at: row.get(22)?,
            updated_at: row.get(23)?,
        })
    }
}

impl ProductRepository for LibSqlProductRepository<'_> {
    async fn create(&self, product: &Product) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO products ({PRODUCT_COLUMNS})
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    product.id.as_str(),
                    product.vendor_id.clone(),
                    product.sku.clone(),
                    product.name.clone(),
                    product.description.clone(),
                    product.status.as_str(),
                    product.price.clone(),
                    product.compare_at_price.clone(),
                    product.inventory,
                    serde_json::to_string(&product.tags)?,
                    serde_json::to_string(&product.images)?,
                    serde_json::to_string(&product.variants)?,
                    product.content_hash.clone(),
                    product.variants_hash.clone(),
                    product.images_hash.clone(),
                    product.last_hashed_at,
                    product.sync_version,
                    i32::from(product.needs_sync),
                    product.last_modified_by.clone(),
                    product.sync_conflict.clone(),
                    product.last_sync_at,
                    product.remote_updated_at,
                    product.created_at,
                    product.updated_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"),
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_product(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_by_sku(&self, sku: &str) -> Result<Option<Product>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?"),
                [sku],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_product(&row)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, id: &ProductId, update: &ProductUpdate) -> Result<Product> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(name) = &update.name {
            sets.push("name = ?");
            values.push(name.clone().into());
        }
        if let Some(description) = &update.description {
            sets.push("description = ?");
            values.push(description.clone().into());
        }
        if let Some(status) = &update.status {
            sets.push("status = ?");
            values.push(status.as_str().into());
        }
        if let Some(price) = &update.price {
            sets.push("price = ?");
            values.push(price.clone().into());
        }
        if let Some(compare_at_price) = &update.compare_at_price {
            sets.push("compare_at_price = ?");
            values.push(compare_at_price.clone().into());
        }
        if let Some(inventory) = update.inventory {
            sets.push("inventory = ?");
            values.push(inventory.into());
        }
        if let Some(tags) = &update.tags {
            sets.push("tags = ?");
            values.push(serde_json::to_string(tags)?.into());
        }
        if let Some(images) = &update.images {
            sets.push("images = ?");
            values.push(serde_json::to_string(images)?.into());
        }
        if let Some(variants) = &update.variants {
            sets.push("variants = ?");
            values.push(serde_json::to_string(variants)?.into());
        }
        if let Some(content_hash) = &update.content_hash {
            sets.push("content_hash = ?");
            values.push(content_hash.clone().into());
        }
        if let Some(variants_hash) = &update.variants_hash {
            sets.push("variants_hash = ?");
            values.push(variants_hash.clone().into());
        }
        if let Some(images_hash) = &update.images_hash {
            sets.push("images_hash = ?");
            values.push(images_hash.clone().into());
        }
        if let Some(last_hashed_at) = update.last_hashed_at {
            sets.push("last_hashed_at = ?");
            values.push(last_hashed_at.into());
        }
        if let Some(sync_version) = update.sync_version {
            sets.push("sync_version = ?");
            values.push(sync_version.into());
        }
        if let Some(needs_sync) = update.needs_sync {
            sets.push("needs_sync = ?");
            values.push(i64::from(needs_sync).into());
        }
        if let Some(last_modified_by) = &update.last_modified_by {
            sets.push("last_modified_by = ?");
            values.push(last_modified_by.clone().into());
        }
        if let Some(sync_conflict) = &update.sync_conflict {
            sets.push("sync_conflict = ?");
            values.push(match sync_conflict {
                Some(marker) => marker.clone().into(),
                None => Value::Null,
            });
        }
        if let Some(last_sync_at) = update.last_sync_at {
            sets.push("last_sync_at = ?");
            values.push(last_sync_at.into());
        }
        if let Some(remote_updated_at) = update.remote_updated_at {
            sets.push("remote_updated_at = ?");
            values.push(remote_updated_at.into());
        }

        if sets.is_empty() {
            return self
                .get(id)
                .await?
                .ok_or_else(|| Error::NotFound(id.to_string()));
        }

        sets.push("updated_at = ?");
        values.push(chrono::Utc::now().timestamp_millis().into());
        values.push(id.as_str().into());

        let sql = format!("UPDATE products SET {} WHERE id = ?", sets.join(", "));
        let rows = self.conn.execute(&sql, values).await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn list_for_vendor(
        &self,
        vendor_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Product>> {
        #[allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {PRODUCT_COLUMNS} FROM products
                     WHERE vendor_id = ?
                     ORDER BY updated_at DESC
                     LIMIT ? OFFSET ?"
                ),
                params![vendor_id, limit as i64, offset as i64],
            )
            .await?;

        let mut products = Vec::new();
        while let Some(row) = rows.next().await? {
            products.push(Self::parse_product(&row)?);
        }
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ProductStatus, Vendor};
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        let vendor = Vendor::new("vendor-1", "Summit Gear", None);
        db.connection()
            .execute(
                "INSERT INTO vendors (id, name, store_id, created_at) VALUES (?, ?, ?, ?)",
                params![
                    vendor.id.clone(),
                    vendor.name.clone(),
                    vendor.store_id.clone(),
                    vendor.created_at
                ],
            )
            .await
            .unwrap();
        db
    }

    fn sample_product(sku: &str) -> Product {
        let now = chrono::Utc::now().timestamp_millis();
        Product {
            id: ProductId::new(),
            vendor_id: "vendor-1".to_string(),
            sku: sku.to_string(),
            name: "Trail Shirt".to_string(),
            description: "Breathable".to_string(),
            status: ProductStatus::Active,
            price: "10.00".to_string(),
            compare_at_price: None,
            inventory: 5,
            tags: vec!["outdoor".to_string()],
            images: vec![ProductImage {
                src: "https://cdn.example.com/1.jpg".to_string(),
                position: 1,
            }],
            variants: vec![ProductVariant {
                sku: Some(sku.to_string()),
                price: "10.00".to_string(),
                compare_at_price: None,
                barcode: None,
                inventory_quantity: 5,
                options: vec!["M".to_string()],
                position: 1,
            }],
            content_hash: None,
            variants_hash: None,
            images_hash: None,
            last_hashed_at: None,
            sync_version: 1,
            needs_sync: false,
            last_modified_by: None,
            sync_conflict: None,
            last_sync_at: None,
            remote_updated_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_and_get_by_sku() {
        let db = setup().await;
        let repo = LibSqlProductRepository::new(db.connection());

        let product = sample_product("TS-1");
        repo.create(&product).await.unwrap();

        let fetched = repo.get_by_sku("TS-1").await.unwrap().unwrap();
        assert_eq!(fetched, product);

        assert!(repo.get_by_sku("TS-MISSING").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_duplicate_sku_rejected() {
        let db = setup().await;
        let repo = LibSqlProductRepository::new(db.connection());

        repo.create(&sample_product("TS-1")).await.unwrap();
        assert!(repo.create(&sample_product("TS-1")).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_partial_update_leaves_other_fields() {
        let db = setup().await;
        let repo = LibSqlProductRepository::new(db.connection());

        let product = sample_product("TS-1");
        repo.create(&product).await.unwrap();

        let update = ProductUpdate {
            price: Some("12.00".to_string()),
            sync_version: Some(2),
            ..Default::default()
        };
        let updated = repo.update(&product.id, &update).await.unwrap();

        assert_eq!(updated.price, "12.00");
        assert_eq!(updated.sync_version, 2);
        assert_eq!(updated.name, product.name);
        assert_eq!(updated.inventory, product.inventory);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_clears_conflict_marker() {
        let db = setup().await;
        let repo = LibSqlProductRepository::new(db.connection());

        let product = sample_product("TS-1");
        repo.create(&product).await.unwrap();

        let flagged = repo
            .update(
                &product.id,
                &ProductUpdate {
                    sync_conflict: Some(Some("concurrent_modification".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            flagged.sync_conflict.as_deref(),
            Some("concurrent_modification")
        );

        let cleared = repo
            .update(
                &product.id,
                &ProductUpdate {
                    sync_conflict: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.sync_conflict, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_missing_product_fails() {
        let db = setup().await;
        let repo = LibSqlProductRepository::new(db.connection());

        let missing = ProductId::new();
        let result = repo
            .update(
                &missing,
                &ProductUpdate {
                    price: Some("1.00".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_for_vendor() {
        let db = setup().await;
        let repo = LibSqlProductRepository::new(db.connection());

        repo.create(&sample_product("TS-1")).await.unwrap();
        repo.create(&sample_product("TS-2")).await.unwrap();

        let products = repo.list_for_vendor("vendor-1", 10, 0).await.unwrap();
        assert_eq!(products.len(), 2);

        let none = repo.list_for_vendor("vendor-2", 10, 0).await.unwrap();
        assert!(none.is_empty());
    }
}
