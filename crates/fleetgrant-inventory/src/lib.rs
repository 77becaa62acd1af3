//! fleetgrant-inventory: fleet inventory queries
//!
//! Builds PQL queries against the fleet inventory service and defines the
//! [`InventoryQuery`] seam the reconciler resolves hosts through.

pub mod error;
pub mod http;
pub mod query;
pub mod traits;

pub use error::InventoryError;
pub use http::HttpInventoryClient;
pub use query::{Query, queries};
pub use traits::InventoryQuery;
