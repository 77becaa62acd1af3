//! fleetgrant-core: access-grant reconciliation
//!
//! Computes the desired state that lets one reporting node read logs,
//! configuration trees and database contents from the node being reconciled:
//! filesystem exports, a read-only database role with its grants, and
//! certificate allow-list entries. Nothing here touches the system directly.
//! Components declare resources into a [`Catalog`], and [`apply()`] hands them,
//! dependency-ordered, to collaborator implementations.

pub mod apply;
pub mod catalog;
pub mod clients;
pub mod config;
pub mod controller;
pub mod error;
pub mod exports;
pub mod facts;
pub mod grants;
pub mod notify;
pub mod resolver;

pub use apply::{
    ApplyReport, BoxError, Collaborators, ComponentInstaller, DatabaseAdmin, ExportManager,
    GuardOutcome, apply,
};
pub use catalog::{
    AllowListEntry, Catalog, Component, ConnectionParams, Declaration, Ensure, ExportDeclaration,
    GrantDeclaration, GuardedCommand, Privilege, Resource, ResourceKind, ResourceRef,
    RoleDeclaration,
};
pub use clients::{build_client_spec, resolve_source_addresses};
pub use config::{DatabaseConfig, ReconcileConfig};
pub use controller::{ConvergenceController, ConvergenceReport};
pub use error::{CatalogError, CoreError};
pub use exports::declare_exports;
pub use facts::{NodeFacts, PostgresqlInfo};
pub use grants::{GrantOutcome, declare_database_access, declare_grants};
pub use notify::{Notifier, TracingNotifier};
pub use resolver::resolve_reporting_host;
