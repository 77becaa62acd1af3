//! Reporting host resolution

use fleetgrant_inventory::{InventoryQuery, queries};
use tracing::{debug, instrument};

use crate::error::CoreError;

/// Determine the reporting host
///
/// A non-empty `explicit` value wins without consulting the inventory.
/// Otherwise the inventory is asked for live nodes carrying
/// `importer_class` and the smallest certname is chosen. `Ok(None)` means no
/// candidate exists.
///
/// # Errors
/// Returns an error if the inventory query fails. A failed query is never
/// reported as "no candidate".
#[instrument(skip(explicit, inventory))]
pub async fn resolve_reporting_host(
    explicit: Option<&str>,
    importer_class: &str,
    inventory: &dyn InventoryQuery,
) -> Result<Option<String>, CoreError> {
    if let Some(host) = explicit.filter(|h| !h.trim().is_empty()) {
        debug!(host, "reporting host from configuration");
        return Ok(Some(host.to_string()));
    }

    let mut candidates = inventory
        .query(&queries::reporting_host(importer_class))
        .await?;
    candidates.sort();

    let host = candidates.into_iter().next();
    debug!(host = ?host, "reporting host from inventory");
    Ok(host)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use fleetgrant_inventory::{InventoryError, Query};

    use super::*;

    struct ScriptedInventory {
        rows: Result<Vec<String>, InventoryError>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedInventory {
        fn new(rows: Result<Vec<&str>, InventoryError>) -> Self {
            Self {
                rows: rows.map(|r| r.into_iter().map(String::from).collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InventoryQuery for ScriptedInventory {
        async fn query(&self, query: &Query) -> Result<Vec<String>, InventoryError> {
            self.seen.lock().unwrap().push(query.build());
            self.rows.clone()
        }
    }

    #[tokio::test]
    async fn test_explicit_host_skips_inventory() {
        let inventory = ScriptedInventory::new(Ok(vec!["other.example"]));
        let host = resolve_reporting_host(Some("report.example"), "Role::Importer", &inventory)
            .await
            .unwrap();
        assert_eq!(host.as_deref(), Some("report.example"));
        assert!(inventory.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_explicit_falls_back_to_inventory() {
        let inventory = ScriptedInventory::new(Ok(vec!["a.example"]));
        let host = resolve_reporting_host(Some(""), "Role::Importer", &inventory)
            .await
            .unwrap();
        assert_eq!(host.as_deref(), Some("a.example"));
    }

    #[tokio::test]
    async fn test_smallest_candidate_wins() {
        let inventory = ScriptedInventory::new(Ok(vec!["nodeB", "nodeA"]));
        let host = resolve_reporting_host(None, "Role::Importer", &inventory)
            .await
            .unwrap();
        assert_eq!(host.as_deref(), Some("nodeA"));

        let seen = inventory.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("title = \"Role::Importer\""));
        assert!(seen[0].ends_with("order by certname asc limit 1 }"));
    }

    #[tokio::test]
    async fn test_no_candidates_is_unresolved() {
        let inventory = ScriptedInventory::new(Ok(vec![]));
        let host = resolve_reporting_host(None, "Role::Importer", &inventory)
            .await
            .unwrap();
        assert!(host.is_none());
    }

    #[tokio::test]
    async fn test_query_failure_is_hard_error() {
        let inventory = ScriptedInventory::new(Err(InventoryError::Timeout));
        let result = resolve_reporting_host(None, "Role::Importer", &inventory).await;
        assert!(matches!(
            result,
            Err(CoreError::Inventory(InventoryError::Timeout))
        ));
    }
}
