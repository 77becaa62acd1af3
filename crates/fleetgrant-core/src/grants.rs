//! Database access for the reporting host
//!
//! On a database host the reporting host gets one shared read-only role,
//! and for every platform database: `CONNECT`, `SELECT` on every table in
//! `public`, and a certificate allow-list entry. The `SELECT` grant runs as a
//! guarded command that is skipped once the role already holds a `SELECT`
//! grant in that schema.

use fleetgrant_inventory::InventoryQuery;
use tracing::{info, instrument};

use crate::catalog::{
    AllowListEntry, Catalog, Component, ConnectionParams, GrantDeclaration, GuardedCommand,
    Privilege, Resource, RoleDeclaration,
};
use crate::config::{DatabaseConfig, ReconcileConfig};
use crate::error::{CatalogError, CoreError};
use crate::facts::NodeFacts;
use crate::notify::Notifier;
use crate::resolver::resolve_reporting_host;

/// Platform databases the reporting host reads: activity, classifier,
/// inventory, catalog store, RBAC, orchestrator
pub const DATABASES: [&str; 6] = [
    "pe-activity",
    "pe-classifier",
    "pe-inventory",
    "pe-puppetdb",
    "pe-rbac",
    "pe-orchestrator",
];

pub const IPV4_ALLOW_ALL: &str = "0.0.0.0/0";
pub const IPV6_ALLOW_ALL: &str = "::/0";

/// Notice emitted when no reporting host can be determined
pub const UNRESOLVED_HOST_NOTICE: &str = "no reporting host: set `reporting_host` in configuration \
     or classify an agent node with the importer role; skipping database grants";

/// Result of [`declare_database_access`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    /// Grants were declared for this host
    Granted { host: String },
    /// No host could be determined; only the access profile was declared
    Unresolved { notice: String },
}

/// Identity map holding certificate-to-role mappings for a server version
#[must_use]
pub fn ident_map_path(version: &str) -> String {
    format!("/opt/puppetlabs/server/data/postgresql/{version}/data/pg_ident.conf")
}

fn select_guard(role: &str) -> String {
    format!(
        "SELECT 1 FROM information_schema.role_table_grants \
         WHERE grantee = '{}' AND table_schema = 'public' AND privilege_type = 'SELECT' LIMIT 1",
        role.replace('\'', "''")
    )
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Declare the role and every per-database step for `host`
///
/// # Errors
/// Returns a conflict if the catalog already holds different content under
/// the same references.
pub fn declare_grants(
    catalog: &mut Catalog,
    host: &str,
    postgres_version: &str,
    db: &DatabaseConfig,
) -> Result<(), CatalogError> {
    let role = catalog.declare(
        Resource::Role(RoleDeclaration {
            name: db.role.clone(),
        }),
        Vec::new(),
    )?;

    let connection = ConnectionParams {
        user: db.superuser.clone(),
        group: db.group().to_string(),
        psql_path: db.psql_path.clone(),
    };
    let ident_map = ident_map_path(postgres_version);

    for database in DATABASES {
        catalog.declare(
            Resource::Grant(GrantDeclaration {
                privilege: Privilege::Connect,
                database: database.to_string(),
                role: db.role.clone(),
            }),
            vec![role.clone()],
        )?;

        catalog.declare(
            Resource::GuardedCommand(GuardedCommand {
                name: format!("grant select on {database} to {}", db.role),
                sql: format!(
                    "GRANT SELECT ON ALL TABLES IN SCHEMA public TO {}",
                    quote_ident(&db.role)
                ),
                database: database.to_string(),
                connection: connection.clone(),
                unless: select_guard(&db.role),
            }),
            vec![role.clone()],
        )?;

        catalog.declare(
            Resource::AllowList(AllowListEntry {
                user: db.role.clone(),
                database: database.to_string(),
                cert_identity: host.to_string(),
                ident_map_path: ident_map.clone(),
                ipv4_mask: IPV4_ALLOW_ALL.to_string(),
                ipv6_mask: IPV6_ALLOW_ALL.to_string(),
            }),
            vec![role.clone()],
        )?;
    }

    Ok(())
}

/// Declare database access for the reporting host on a database node
///
/// The access profile is always included. When no reporting host can be
/// resolved the notifier receives one notice and no grants are declared.
///
/// # Errors
/// Returns an error if the inventory query fails or the catalog conflicts.
#[instrument(skip_all, fields(node = %facts.certname))]
pub async fn declare_database_access(
    catalog: &mut Catalog,
    facts: &NodeFacts,
    config: &ReconcileConfig,
    inventory: &dyn InventoryQuery,
    notifier: &dyn Notifier,
) -> Result<GrantOutcome, CoreError> {
    catalog.declare(
        Resource::Include {
            component: Component::AccessProfile,
        },
        Vec::new(),
    )?;

    let resolved = resolve_reporting_host(
        config.reporting_host.as_deref(),
        &config.importer_class,
        inventory,
    )
    .await?;

    let Some(host) = resolved else {
        notifier.warn(UNRESOLVED_HOST_NOTICE);
        return Ok(GrantOutcome::Unresolved {
            notice: UNRESOLVED_HOST_NOTICE.to_string(),
        });
    };

    let version = facts.postgres_version();
    info!(host = %host, version, "declaring database grants");
    declare_grants(catalog, &host, version, &config.database)?;

    Ok(GrantOutcome::Granted { host })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ResourceKind;

    fn granted() -> Catalog {
        let mut catalog = Catalog::new();
        declare_grants(
            &mut catalog,
            "report.example",
            "11",
            &DatabaseConfig::default(),
        )
        .unwrap();
        catalog
    }

    #[test]
    fn test_one_role_and_three_steps_per_database() {
        let catalog = granted();
        assert_eq!(catalog.count(ResourceKind::Role), 1);
        assert_eq!(catalog.count(ResourceKind::Grant), 6);
        assert_eq!(catalog.count(ResourceKind::GuardedCommand), 6);
        assert_eq!(catalog.count(ResourceKind::AllowList), 6);
    }

    #[test]
    fn test_every_step_requires_only_the_role() {
        let catalog = granted();
        let role = crate::catalog::ResourceRef::new(ResourceKind::Role, "fleetgrant_reader");
        for decl in catalog.iter().filter(|d| d.reference.kind != ResourceKind::Role) {
            assert_eq!(decl.requires, vec![role.clone()], "{}", decl.reference);
        }
    }

    #[test]
    fn test_guarded_select() {
        let catalog = granted();
        let cmd = catalog
            .iter()
            .find_map(|d| match &d.resource {
                Resource::GuardedCommand(c) if c.database == "pe-rbac" => Some(c),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            cmd.sql,
            "GRANT SELECT ON ALL TABLES IN SCHEMA public TO \"fleetgrant_reader\""
        );
        assert!(cmd.unless.contains("grantee = 'fleetgrant_reader'"));
        assert!(cmd.unless.contains("privilege_type = 'SELECT'"));
        assert_eq!(cmd.connection.user, "pe-postgres");
        assert_eq!(cmd.connection.group, "pe-postgres");
    }

    #[test]
    fn test_allow_list_uses_version_path() {
        let catalog = granted();
        for decl in catalog.iter() {
            if let Resource::AllowList(entry) = &decl.resource {
                assert_eq!(entry.cert_identity, "report.example");
                assert_eq!(
                    entry.ident_map_path,
                    "/opt/puppetlabs/server/data/postgresql/11/data/pg_ident.conf"
                );
                assert_eq!(entry.ipv4_mask, "0.0.0.0/0");
                assert_eq!(entry.ipv6_mask, "::/0");
            }
        }
    }

    #[test]
    fn test_redeclaring_is_idempotent() {
        let mut catalog = granted();
        let before = catalog.clone();
        declare_grants(
            &mut catalog,
            "report.example",
            "11",
            &DatabaseConfig::default(),
        )
        .unwrap();
        assert_eq!(catalog, before);
    }

    #[test]
    fn test_different_host_for_same_role_adds_entries() {
        let mut catalog = granted();
        declare_grants(
            &mut catalog,
            "other.example",
            "11",
            &DatabaseConfig::default(),
        )
        .unwrap();
        assert_eq!(catalog.count(ResourceKind::Role), 1);
        assert_eq!(catalog.count(ResourceKind::AllowList), 12);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
