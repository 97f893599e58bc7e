//! Warehouse transfer operations
//!
//! The extract, load, and transfer endpoints over the connector layer.

mod routes;

pub use routes::{transfer_routes, LoadBody};
