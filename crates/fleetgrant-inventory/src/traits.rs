//! Inventory query trait

use async_trait::async_trait;

use crate::error::InventoryError;
use crate::query::Query;

/// A fleet inventory service that answers PQL queries
///
/// Implementations return the value of the query's projected field for each
/// matching row, in the order the service returned them. An empty vector is a
/// valid answer; any failure to reach or read the service must be an `Err`.
#[async_trait]
pub trait InventoryQuery: Send + Sync {
    async fn query(&self, query: &Query) -> Result<Vec<String>, InventoryError>;
}
