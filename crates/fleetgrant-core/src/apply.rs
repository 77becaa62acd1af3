//! Applying a catalog through collaborators
//!
//! Each declaration is dispatched, in dependency order, to the collaborator
//! that owns its kind of state. Collaborators are expected to be idempotent:
//! applying a catalog twice must leave the system unchanged the second time.
//! The first collaborator failure stops the run and is returned as is.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::catalog::{
    AllowListEntry, Catalog, Component, ExportDeclaration, GrantDeclaration, GuardedCommand,
    Resource, ResourceRef, RoleDeclaration,
};
use crate::error::CoreError;

/// Error type returned by collaborators
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Whether a guarded command ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Executed,
    /// The guard query returned rows, so the command was skipped
    Skipped,
}

/// Maintains filesystem exports
#[async_trait]
pub trait ExportManager: Send + Sync {
    async fn declare(&self, export: &ExportDeclaration) -> Result<(), BoxError>;
}

/// Applies roles, grants and allow-list entries to the database engine
#[async_trait]
pub trait DatabaseAdmin: Send + Sync {
    async fn create_role(&self, role: &RoleDeclaration) -> Result<(), BoxError>;

    async fn grant_privilege(&self, grant: &GrantDeclaration) -> Result<(), BoxError>;

    /// Run `command.sql` unless `command.unless` returns a row
    async fn run_guarded_command(&self, command: &GuardedCommand)
    -> Result<GuardOutcome, BoxError>;

    async fn declare_allow_list_entry(&self, entry: &AllowListEntry) -> Result<(), BoxError>;
}

/// Installs components managed outside this crate
#[async_trait]
pub trait ComponentInstaller: Send + Sync {
    async fn include(&self, component: Component) -> Result<(), BoxError>;
}

/// Collaborators a catalog is applied through
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub exports: &'a dyn ExportManager,
    pub database: &'a dyn DatabaseAdmin,
    pub components: &'a dyn ComponentInstaller,
}

/// What happened during [`apply`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Resources handed to a collaborator, in application order
    pub applied: Vec<ResourceRef>,
    /// Guarded commands whose guard was already satisfied
    pub skipped: Vec<ResourceRef>,
}

/// Apply every declaration in dependency order
///
/// # Errors
/// Returns a catalog error if the declarations cannot be ordered, or the
/// first collaborator failure together with the resource being applied.
#[instrument(skip_all, fields(resources = catalog.len()))]
pub async fn apply(
    catalog: &Catalog,
    collaborators: Collaborators<'_>,
) -> Result<ApplyReport, CoreError> {
    let mut report = ApplyReport::default();

    for decl in catalog.ordered()? {
        debug!(resource = %decl.reference, "applying");
        let failed = |source: BoxError| CoreError::Collaborator {
            resource: decl.reference.clone(),
            source,
        };

        match &decl.resource {
            Resource::Export(export) => {
                collaborators.exports.declare(export).await.map_err(failed)?;
            }
            Resource::Include { component } => {
                collaborators
                    .components
                    .include(*component)
                    .await
                    .map_err(failed)?;
            }
            Resource::Role(role) => {
                collaborators
                    .database
                    .create_role(role)
                    .await
                    .map_err(failed)?;
            }
            Resource::Grant(grant) => {
                collaborators
                    .database
                    .grant_privilege(grant)
                    .await
                    .map_err(failed)?;
            }
            Resource::GuardedCommand(command) => {
                let outcome = collaborators
                    .database
                    .run_guarded_command(command)
                    .await
                    .map_err(failed)?;
                if outcome == GuardOutcome::Skipped {
                    report.skipped.push(decl.reference.clone());
                    continue;
                }
            }
            Resource::AllowList(entry) => {
                collaborators
                    .database
                    .declare_allow_list_entry(entry)
                    .await
                    .map_err(failed)?;
            }
        }

        report.applied.push(decl.reference.clone());
    }

    info!(
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        "catalog applied"
    );
    Ok(report)
}
