//! Core error types for fleetgrant-core

use fleetgrant_inventory::InventoryError;
use thiserror::Error;

use crate::apply::BoxError;
use crate::catalog::ResourceRef;

/// Errors raised while building or ordering a catalog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Same resource declared twice with different content
    #[error("conflicting declarations for {0}")]
    Conflict(ResourceRef),

    /// A declaration requires a resource that was never declared
    #[error("{resource} requires undeclared {missing}")]
    MissingDependency {
        /// Declaring resource
        resource: ResourceRef,
        /// Requirement that could not be found
        missing: ResourceRef,
    },

    /// The `requires` edges form a cycle
    #[error("dependency cycle between: {}", format_refs(.0))]
    Cycle(Vec<ResourceRef>),
}

fn format_refs(refs: &[ResourceRef]) -> String {
    refs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that can occur during a reconciliation run
#[derive(Error, Debug)]
pub enum CoreError {
    /// Inventory query failed
    #[error("inventory query failed: {0}")]
    Inventory(#[from] InventoryError),

    /// Catalog could not be built or ordered
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// A collaborator failed while applying a resource
    #[error("applying {resource} failed: {source}")]
    Collaborator {
        /// Resource being applied
        resource: ResourceRef,
        /// Error raised by the collaborator
        #[source]
        source: BoxError,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),
}
