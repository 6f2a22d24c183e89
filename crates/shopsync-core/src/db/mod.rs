//! Database layer for shopsync

mod connection;
mod migrations;
mod product_repository;
mod review_repository;
mod run_repository;
mod vendor_repository;

pub use connection::Database;
pub use product_repository::{LibSqlProductRepository, ProductRepository};
pub use review_repository::{LibSqlReviewRepository, ReviewRepository};
pub use run_repository::{LibSqlSyncRunRepository, SyncRunRepository};
pub use vendor_repository::{LibSqlVendorRepository, VendorRepository};
