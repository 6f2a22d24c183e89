//! Vendor repository implementation

use libsql::{params, Connection, Row};

use crate::error::Result;
use crate::models::Vendor;

/// Trait for vendor storage operations (async)
#[allow(async_fn_in_trait)]
pub trait VendorRepository {
    /// Get a vendor by id
    async fn get(&self, id: &str) -> Result<Option<Vendor>>;

    /// Insert or replace a vendor record
    async fn upsert(&self, vendor: &Vendor) -> Result<()>;

    /// List all vendors, oldest first
    async fn list(&self) -> Result<Vec<Vendor>>;
}

/// libSQL implementation of `VendorRepository`
pub struct LibSqlVendorRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlVendorRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_vendor(row: &Row) -> Result<Vendor> {
        Ok(Vendor {
            id: row.get(0)?,
            name: row.get(1)?,
            store_id: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl VendorRepository for LibSqlVendorRepository<'_> {
    async fn get(&self, id: &str) -> Result<Option<Vendor>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, store_id, created_at FROM vendors WHERE id = ?",
                [id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_vendor(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, vendor: &Vendor) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO vendors (id, name, store_id, created_at) VALUES (?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, store_id = excluded.store_id",
                params![
                    vendor.id.clone(),
                    vendor.name.clone(),
                    vendor.store_id.clone(),
                    vendor.created_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Vendor>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, store_id, created_at FROM vendors ORDER BY created_at ASC",
                (),
            )
            .await?;

        let mut vendors = Vec::new();
        while let Some(row) = rows.next().await? {
            vendors.push(Self::parse_vendor(&row)?);
        }
        Ok(vendors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_and_get() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlVendorRepository::new(db.connection());

        let vendor = Vendor::new("vendor-1", "Summit Gear", Some("store-1".to_string()));
        repo.upsert(&vendor).await.unwrap();

        let fetched = repo.get("vendor-1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Summit Gear");

        // Upsert replaces the name, keeps the id
        let renamed = Vendor {
            name: "Summit Gear Co".to_string(),
            ..vendor
        };
        repo.upsert(&renamed).await.unwrap();
        let fetched = repo.get("vendor-1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Summit Gear Co");

        assert!(repo.get("vendor-2").await.unwrap().is_none());
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
