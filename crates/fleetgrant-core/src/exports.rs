//! Filesystem export declarations

use crate::catalog::{Catalog, Ensure, ExportDeclaration, Resource};
use crate::error::CatalogError;

/// Source trees exported to the reporting host: logs, installed software, configuration
pub const EXPORTED_TREES: [&str; 3] = ["/var/log", "/opt/puppetlabs", "/etc/puppetlabs"];

/// NFS options the reporting host mounts with
pub const NFS_OPTIONS: &str = "tcp,nolock,rsize=32768,wsize=32768,soft,noatime,actimeo=3,retrans=1";

/// Tag grouping these exports for the export manager
pub const EXPORT_TAG: &str = "fleetgrant_exports";

/// Root under which each node's trees are mounted
pub const MOUNT_ROOT: &str = "/mnt/fleetgrant";

/// Declare the three exports for `certname`
///
/// # Errors
/// Returns a conflict if the catalog already holds different exports for
/// the same trees.
pub fn declare_exports(
    catalog: &mut Catalog,
    enabled: bool,
    client_spec: &str,
    certname: &str,
) -> Result<(), CatalogError> {
    let ensure = Ensure::from_enabled(enabled);

    for tree in EXPORTED_TREES {
        catalog.declare(
            Resource::Export(ExportDeclaration {
                path: tree.to_string(),
                ensure,
                clients: client_spec.to_string(),
                mount_point: format!("{MOUNT_ROOT}/{certname}{tree}"),
                options: NFS_OPTIONS.to_string(),
                tag: EXPORT_TAG.to_string(),
            }),
            Vec::new(),
        )?;
    }

    Ok(())
}
