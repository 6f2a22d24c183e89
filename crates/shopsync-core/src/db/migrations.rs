//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 3;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }
    if version < 3 {
        migrate_v3(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

async fn apply(conn: &Connection, statements: &[&str]) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // inside a transaction for atomicity
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    Ok(())
}

/// Migration to version 1: vendors and products
async fn migrate_v1(conn: &Connection) -> Result<()> {
    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Vendors table
        "CREATE TABLE IF NOT EXISTS vendors (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            store_id TEXT,
            created_at INTEGER NOT NULL
        )",
        // Products table; JSON columns hold tags/images/variants as the
        // engine treats them as opaque value lists
        "CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            vendor_id TEXT NOT NULL REFERENCES vendors(id),
            sku TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'active',
            price TEXT NOT NULL DEFAULT '0.00',
            compare_at_price TEXT,
            inventory INTEGER NOT NULL DEFAULT 0,
            tags TEXT NOT NULL DEFAULT '[]',
            images TEXT NOT NULL DEFAULT '[]',
            variants TEXT NOT NULL DEFAULT '[]',
            content_hash TEXT,
            variants_hash TEXT,
            images_hash TEXT,
            last_hashed_at INTEGER,
            sync_version INTEGER NOT NULL DEFAULT 1,
            needs_sync INTEGER NOT NULL DEFAULT 0,
            last_modified_by TEXT,
            sync_conflict TEXT,
            last_sync_at INTEGER,
            remote_updated_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_products_vendor ON products(vendor_id)",
        "CREATE INDEX IF NOT EXISTS idx_products_updated ON products(updated_at DESC)",
        "CREATE INDEX IF NOT EXISTS idx_products_needs_sync ON products(needs_sync)",
        // Record migration version
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    apply(conn, &statements).await?;
    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: sync run ledger
async fn migrate_v2(conn: &Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS sync_runs (
            run_id TEXT PRIMARY KEY,
            sync_job_id TEXT NOT NULL,
            vendor_id TEXT NOT NULL,
            store_id TEXT,
            direction TEXT NOT NULL,
            batch_size INTEGER NOT NULL,
            page_cursor TEXT,
            status TEXT NOT NULL,
            products_found INTEGER NOT NULL DEFAULT 0,
            products_processed INTEGER NOT NULL DEFAULT 0,
            products_created INTEGER NOT NULL DEFAULT 0,
            products_updated INTEGER NOT NULL DEFAULT 0,
            products_failed INTEGER NOT NULL DEFAULT 0,
            products_skipped INTEGER NOT NULL DEFAULT 0,
            api_calls_made INTEGER NOT NULL DEFAULT 0,
            rate_limit_hits INTEGER NOT NULL DEFAULT 0,
            avg_response_ms REAL NOT NULL DEFAULT 0,
            errors TEXT NOT NULL DEFAULT '[]',
            conflicts TEXT NOT NULL DEFAULT '[]',
            warnings TEXT NOT NULL DEFAULT '[]',
            parent_run_id TEXT,
            retried_from_run_id TEXT,
            started_at INTEGER NOT NULL,
            completed_at INTEGER
        )",
        "CREATE INDEX IF NOT EXISTS idx_sync_runs_job ON sync_runs(sync_job_id)",
        "CREATE INDEX IF NOT EXISTS idx_sync_runs_started ON sync_runs(started_at DESC)",
        // Append-only event ledger; no UPDATE/DELETE path exists in the code
        "CREATE TABLE IF NOT EXISTS product_sync_events (
            id TEXT PRIMARY KEY,
            sync_run_id TEXT NOT NULL REFERENCES sync_runs(run_id),
            product_id TEXT,
            sku TEXT NOT NULL,
            event_type TEXT NOT NULL,
            operation TEXT NOT NULL,
            old_hash TEXT,
            new_hash TEXT,
            old_version INTEGER,
            new_version INTEGER,
            changed_fields TEXT NOT NULL DEFAULT '[]',
            before_data TEXT,
            after_data TEXT,
            remote_data TEXT,
            success INTEGER NOT NULL,
            error_message TEXT,
            error_code TEXT,
            conflict_reason TEXT,
            skipped_reason TEXT,
            processing_time_ms INTEGER,
            created_at INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_sync_events_run ON product_sync_events(sync_run_id)",
        "CREATE INDEX IF NOT EXISTS idx_sync_events_sku ON product_sync_events(sku)",
        "INSERT INTO schema_version (version) VALUES (2)",
    ];

    apply(conn, &statements).await?;
    tracing::info!("Migrated database to version 2");
    Ok(())
}

/// Migration to version 3: durable manual review queue
async fn migrate_v3(conn: &Connection) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS manual_review_items (
            id TEXT PRIMARY KEY,
            sku TEXT NOT NULL,
            conflict_type TEXT NOT NULL,
            local_data TEXT NOT NULL,
            remote_data TEXT NOT NULL,
            conflict_details TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
        )",
        "CREATE INDEX IF NOT EXISTS idx_review_status_created
            ON manual_review_items(status, created_at ASC)",
        "INSERT INTO schema_version (version) VALUES (3)",
    ];

    apply(conn, &statements).await?;
    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn setup() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        db.connect().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let conn = setup().await;
        run(&conn).await.unwrap();
        run(&conn).await.unwrap(); // Should not fail

        let version = get_version(&conn).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migration_creates_core_tables() {
        let conn = setup().await;
        run(&conn).await.unwrap();

        for table in [
            "vendors",
            "products",
            "sync_runs",
            "product_sync_events",
            "manual_review_items",
        ] {
            let mut rows = conn
                .query(
                    "SELECT EXISTS(
                        SELECT 1 FROM sqlite_master
                        WHERE type = 'table' AND name = ?
                    )",
                    [table],
                )
                .await
                .unwrap();

            let exists = rows
                .next()
                .await
                .unwrap()
                .is_some_and(|row| row.get::<i32>(0).unwrap() != 0);

            assert!(exists, "missing table {table}");
        }
    }
}
