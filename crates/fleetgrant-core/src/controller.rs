//! Convergence controller
//!
//! Builds the full catalog for one node from its facts and the run
//! configuration.

use chrono::{DateTime, Utc};
use fleetgrant_inventory::InventoryQuery;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::catalog::{Catalog, Component, Resource};
use crate::clients::{build_client_spec, resolve_source_addresses};
use crate::config::ReconcileConfig;
use crate::error::CoreError;
use crate::exports::declare_exports;
use crate::facts::NodeFacts;
use crate::grants::{GrantOutcome, declare_database_access};
use crate::notify::Notifier;

/// Outcome of a convergence run
#[derive(Debug, Clone, Serialize)]
pub struct ConvergenceReport {
    /// Node the catalog was built for
    pub certname: String,
    pub generated_at: DateTime<Utc>,
    /// Reporting host the grants were declared for, if any
    pub reporting_host: Option<String>,
    /// Notices sent to the operator during the run
    pub warnings: Vec<String>,
    pub catalog: Catalog,
}

/// Sequences exports, metrics and database access for a node
pub struct ConvergenceController<'a> {
    config: &'a ReconcileConfig,
    inventory: &'a dyn InventoryQuery,
    notifier: &'a dyn Notifier,
}

impl<'a> ConvergenceController<'a> {
    pub fn new(
        config: &'a ReconcileConfig,
        inventory: &'a dyn InventoryQuery,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            config,
            inventory,
            notifier,
        }
    }

    /// Build the catalog for `facts`
    ///
    /// Exports are always declared. Fleet metrics are included on core
    /// platform nodes. Database access is declared only on nodes running the
    /// database engine with a known version.
    ///
    /// # Errors
    /// Returns an error if an inventory query fails, the configuration is
    /// invalid, or declarations conflict.
    #[instrument(skip_all, fields(node = %facts.certname))]
    pub async fn converge(&self, facts: &NodeFacts) -> Result<ConvergenceReport, CoreError> {
        self.config.validate()?;
        if facts.certname.trim().is_empty() {
            return Err(CoreError::ConfigError("node certname is empty".to_string()));
        }

        let mut catalog = Catalog::new();
        let mut warnings = Vec::new();
        let mut reporting_host = None;

        let sources = resolve_source_addresses(
            self.config.source_addresses.as_deref(),
            &self.config.importer_class,
            self.inventory,
        )
        .await?;
        let clients = build_client_spec(&sources);
        declare_exports(
            &mut catalog,
            self.config.exports_enabled,
            &clients,
            &facts.certname,
        )?;

        if facts.is_core_platform() {
            debug!("core platform node, including fleet metrics");
            catalog.declare(
                Resource::Include {
                    component: Component::FleetMetrics,
                },
                Vec::new(),
            )?;
        }

        if facts.is_database_host() {
            match declare_database_access(
                &mut catalog,
                facts,
                self.config,
                self.inventory,
                self.notifier,
            )
            .await?
            {
                GrantOutcome::Granted { host } => reporting_host = Some(host),
                GrantOutcome::Unresolved { notice } => warnings.push(notice),
            }
        }

        info!(
            resources = catalog.len(),
            reporting_host = ?reporting_host,
            "catalog built"
        );

        Ok(ConvergenceReport {
            certname: facts.certname.clone(),
            generated_at: Utc::now(),
            reporting_host,
            warnings,
            catalog,
        })
    }
}
