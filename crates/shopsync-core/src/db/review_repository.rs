//! Durable manual review queue repository implementation

use libsql::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{ManualReviewItem, ReviewId, ReviewStatus};

const REVIEW_COLUMNS: &str =
    "id, sku, conflict_type, local_data, remote_data, conflict_details, created_at, status";

/// Trait for manual review queue operations (async)
#[allow(async_fn_in_trait)]
pub trait ReviewRepository {
    /// Append a pending item to the queue
    async fn enqueue(&self, item: &ManualReviewItem) -> Result<()>;

    /// Get one item by id
    async fn get(&self, id: ReviewId) -> Result<Option<ManualReviewItem>>;

    /// List pending items, oldest first (FIFO)
    async fn list_pending(&self, limit: usize) -> Result<Vec<ManualReviewItem>>;

    /// Mark an item resolved; fails when the item is missing or not pending
    async fn mark_resolved(&self, id: ReviewId) -> Result<()>;

    /// Expire pending items created before the cutoff; returns how many
    async fn expire_older_than(&self, cutoff_ms: i64) -> Result<u64>;
}

/// libSQL implementation of `ReviewRepository`
pub struct LibSqlReviewRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlReviewRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_item(row: &Row) -> Result<ManualReviewItem> {
        let id: String = row.get(0)?;
        let conflict_type: String = row.get(2)?;
        let local_data: String = row.get(3)?;
        let remote_data: String = row.get(4)?;
        let status: String = row.get(7)?;

        Ok(ManualReviewItem {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid review id: {id}")))?,
            sku: row.get(1)?,
            conflict_type: conflict_type.parse()?,
            local_data: serde_json::from_str(&local_data)?,
            remote_data: serde_json::from_str(&remote_data)?,
            conflict_details: row.get(5)?,
            created_at: row.get(6)?,
            status: status.parse()?,
        })
    }
}

impl ReviewRepository for LibSqlReviewRepository<'_> {
    async fn enqueue(&self, item: &ManualReviewItem) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO manual_review_items ({REVIEW_COLUMNS})
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    item.id.as_str(),
                    item.sku.clone(),
                    item.conflict_type.as_str(),
                    serde_json::to_string(&item.local_data)?,
                    serde_json::to_string(&item.remote_data)?,
                    item.conflict_details.clone(),
                    item.created_at,
                    item.status.as_str(),
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: ReviewId) -> Result<Option<ManualReviewItem>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {REVIEW_COLUMNS} FROM manual_review_items WHERE id = ?"),
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_item(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_pending(&self, limit: usize) -> Result<Vec<ManualReviewItem>> {
        #[allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {REVIEW_COLUMNS} FROM manual_review_items
                     WHERE status = 'pending'
                     ORDER BY created_at ASC, id ASC
                     LIMIT ?"
                ),
                [limit as i64],
            )
            .await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(Self::parse_item(&row)?);
        }
        Ok(items)
    }

    async fn mark_resolved(&self, id: ReviewId) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE manual_review_items SET status = ? WHERE id = ? AND status = 'pending'",
                params![ReviewStatus::Resolved.as_str(), id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn expire_older_than(&self, cutoff_ms: i64) -> Result<u64> {
        let rows = self
            .conn
            .execute(
                "UPDATE manual_review_items SET status = ?
                 WHERE status = 'pending' AND created_at < ?",
                params![ReviewStatus::Expired.as_str(), cutoff_ms],
            )
            .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::ConflictType;
    use pretty_assertions::assert_eq;

    fn item(sku: &str, created_at: i64) -> ManualReviewItem {
        let mut item = ManualReviewItem::new(
            sku,
            ConflictType::ConcurrentModification,
            serde_json::json!({"price": "10.00"}),
            serde_json::json!({"price": "12.00"}),
            "both sides changed since last sync",
        );
        item.created_at = created_at;
        item
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_queue_is_fifo_by_creation_time() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlReviewRepository::new(db.connection());

        repo.enqueue(&item("B-2", 2000)).await.unwrap();
        repo.enqueue(&item("B-1", 1000)).await.unwrap();
        repo.enqueue(&item("B-3", 3000)).await.unwrap();

        let pending = repo.list_pending(10).await.unwrap();
        let skus: Vec<&str> = pending.iter().map(|item| item.sku.as_str()).collect();
        assert_eq!(skus, vec!["B-1", "B-2", "B-3"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_resolve_removes_from_pending() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlReviewRepository::new(db.connection());

        let first = item("B-1", 1000);
        repo.enqueue(&first).await.unwrap();
        repo.enqueue(&item("B-2", 2000)).await.unwrap();

        repo.mark_resolved(first.id).await.unwrap();

        let pending = repo.list_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].sku, "B-2");

        let resolved = repo.get(first.id).await.unwrap().unwrap();
        assert_eq!(resolved.status, ReviewStatus::Resolved);

        // Resolving again fails: the item is no longer pending
        assert!(repo.mark_resolved(first.id).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_expire_older_than() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlReviewRepository::new(db.connection());

        repo.enqueue(&item("B-1", 1000)).await.unwrap();
        repo.enqueue(&item("B-2", 5000)).await.unwrap();

        let expired = repo.expire_older_than(2000).await.unwrap();
        assert_eq!(expired, 1);

        let pending = repo.list_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].sku, "B-2");
    }
}
