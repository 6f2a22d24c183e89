//! shopsync-core - Core library for shopsync
//!
//! This crate contains the models, persistence layer, remote catalog client,
//! and the idempotent sync engine used by all shopsync interfaces.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Product, ProductId, RunId, SyncRun};
pub use services::CatalogStore;
pub use sync::{SyncEngine, SyncOptions, SyncReport};
