//! fleetgrant CLI
//!
//! Reconciles the access a reporting host needs on this node: exports of the
//! log, software and configuration trees, and read-only database grants.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use eyre::WrapErr;
use fleetgrant_core::{
    Collaborators, ConnectionParams, ConvergenceController, ConvergenceReport, NodeFacts,
    ResourceRef, TracingNotifier, apply, resolve_reporting_host,
};
use fleetgrant_exec::LocalExecutor;
use fleetgrant_inventory::HttpInventoryClient;
use fleetgrant_pg::PsqlAdmin;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

mod collaborators;
mod config;

use collaborators::{ExportsTable, ExternalComponents};
use config::Config;

#[derive(Parser)]
#[command(name = "fleetgrant", version)]
#[command(about = "Reconcile reporting-host access to this node", long_about = None)]
struct Cli {
    /// Configuration file (defaults to FLEETGRANT_CONFIG or the standard locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// JSON file with this node's facts
    #[arg(long, global = true, default_value = "/etc/fleetgrant/facts.json")]
    facts: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the catalog for this node in application order
    Plan,
    /// Build the catalog and apply it
    Apply,
    /// Print the reporting host
    Resolve,
}

#[derive(Serialize)]
struct Plan<'a> {
    #[serde(flatten)]
    report: &'a ConvergenceReport,
    order: Vec<&'a ResourceRef>,
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_facts(path: &Path) -> Result<NodeFacts> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading facts from {}", path.display()))?;
    let facts: NodeFacts = serde_json::from_str(&content)
        .wrap_err_with(|| format!("parsing facts from {}", path.display()))?;
    Ok(facts)
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .wrap_err_with(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default()?,
    };
    init_tracing(&config);

    let inventory = HttpInventoryClient::new(
        &config.inventory.url,
        Duration::from_secs(config.inventory.timeout_secs),
    )?;
    let notifier = TracingNotifier;
    let reconcile = &config.reconcile;

    match cli.command {
        Commands::Resolve => {
            let host = resolve_reporting_host(
                reconcile.reporting_host.as_deref(),
                &reconcile.importer_class,
                &inventory,
            )
            .await?;
            match host {
                Some(host) => println!("{host}"),
                None => eyre::bail!(
                    "no reporting host: set reconcile.reporting_host or classify a node with {}",
                    reconcile.importer_class
                ),
            }
        }
        Commands::Plan => {
            let facts = load_facts(&cli.facts)?;
            let report = ConvergenceController::new(reconcile, &inventory, &notifier)
                .converge(&facts)
                .await?;
            let order = report
                .catalog
                .ordered()?
                .into_iter()
                .map(|d| &d.reference)
                .collect();
            print_json(&Plan {
                report: &report,
                order,
            })?;
        }
        Commands::Apply => {
            let facts = load_facts(&cli.facts)?;
            let report = ConvergenceController::new(reconcile, &inventory, &notifier)
                .converge(&facts)
                .await?;

            let executor = Arc::new(LocalExecutor::new());
            let exports = ExportsTable::new(
                &config.exports.path,
                &config.exports.reload_command,
                executor.clone(),
            );
            let database = PsqlAdmin::new(
                executor,
                ConnectionParams {
                    user: reconcile.database.superuser.clone(),
                    group: reconcile.database.group().to_string(),
                    psql_path: reconcile.database.psql_path.clone(),
                },
            )
            .with_timeout(Duration::from_secs(config.executor.timeout_secs));
            let components = ExternalComponents;

            let applied = apply(
                &report.catalog,
                Collaborators {
                    exports: &exports,
                    database: &database,
                    components: &components,
                },
            )
            .await?;
            print_json(&applied)?;
        }
    }

    Ok(())
}
