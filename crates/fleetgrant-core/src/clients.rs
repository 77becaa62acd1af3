//! Export client list

use fleetgrant_inventory::{InventoryQuery, queries};
use tracing::{debug, instrument};

use crate::error::CoreError;

/// Options every source address is exported with
pub const CLIENT_OPTIONS: &str = "(ro,insecure,async,no_root_squash)";

/// Entry appended to every client list
pub const LOCALHOST_CLIENT: &str = "localhost(ro)";

/// Render the client specification for an export declaration
///
/// Each address gets [`CLIENT_OPTIONS`] and the list always ends with
/// [`LOCALHOST_CLIENT`], so an empty input yields `" localhost(ro)"`.
#[must_use]
pub fn build_client_spec<S: AsRef<str>>(addresses: &[S]) -> String {
    let mut spec = addresses.iter().fold(String::new(), |mut acc, addr| {
        acc.push(' ');
        acc.push_str(addr.as_ref());
        acc.push_str(CLIENT_OPTIONS);
        acc
    });
    spec.push(' ');
    spec.push_str(LOCALHOST_CLIENT);
    spec
}

/// Source addresses from configuration, or every live importer node
///
/// # Errors
/// Returns an error if the inventory lookup fails.
#[instrument(skip(explicit, inventory))]
pub async fn resolve_source_addresses(
    explicit: Option<&[String]>,
    importer_class: &str,
    inventory: &dyn InventoryQuery,
) -> Result<Vec<String>, CoreError> {
    if let Some(addresses) = explicit {
        return Ok(addresses.to_vec());
    }

    let mut nodes = inventory
        .query(&queries::class_members(importer_class))
        .await?;
    nodes.sort();
    nodes.dedup();
    debug!(count = nodes.len(), "source addresses from inventory");
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_is_localhost_only() {
        let empty: [&str; 0] = [];
        assert_eq!(build_client_spec(&empty), " localhost(ro)");
    }

    #[test]
    fn test_each_address_gets_options() {
        let spec = build_client_spec(&["10.0.0.5", "report.example"]);
        assert_eq!(
            spec,
            " 10.0.0.5(ro,insecure,async,no_root_squash) \
             report.example(ro,insecure,async,no_root_squash) localhost(ro)"
        );
        assert_eq!(spec.matches(CLIENT_OPTIONS).count(), 2);
        assert!(spec.ends_with(LOCALHOST_CLIENT));
    }

    #[test]
    fn test_order_is_preserved() {
        let spec = build_client_spec(&["b", "a"]);
        assert!(spec.find("b(").unwrap() < spec.find("a(").unwrap());
    }
}
