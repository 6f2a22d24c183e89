pub mod common;
pub mod completions;
pub mod products;
pub mod review;
pub mod sync;
pub mod vendors;
