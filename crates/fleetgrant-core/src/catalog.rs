//! Desired-state declarations and their dependency graph
//!
//! A [`Catalog`] holds every resource a run wants to exist (or not exist),
//! keyed by [`ResourceRef`]. Declaring an identical resource twice is a no-op;
//! declaring different content under the same reference is a conflict.
//! [`Catalog::ordered`] yields declarations in an order that honours every
//! `requires` edge.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Kind of a declared resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Export,
    Include,
    Role,
    Grant,
    GuardedCommand,
    AllowList,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Export => "Export",
            ResourceKind::Include => "Include",
            ResourceKind::Role => "Role",
            ResourceKind::Grant => "Grant",
            ResourceKind::GuardedCommand => "GuardedCommand",
            ResourceKind::AllowList => "AllowList",
        };
        f.write_str(name)
    }
}

/// Stable identity of a declared resource, rendered as `Kind[title]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub title: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.title)
    }
}

/// Desired state of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    Mounted,
    Absent,
}

impl Ensure {
    #[must_use]
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            Ensure::Mounted
        } else {
            Ensure::Absent
        }
    }
}

/// A filesystem export handed to the export manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDeclaration {
    /// Exported source tree
    pub path: String,
    pub ensure: Ensure,
    /// Client specification, see [`crate::build_client_spec`]
    pub clients: String,
    /// Where the reporting host mounts the tree
    pub mount_point: String,
    /// NFS mount options
    pub options: String,
    /// Groups related exports for the export manager
    pub tag: String,
}

/// Components installed by other tooling and only included from here
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    /// Baseline database access profile (roles and default grant policy)
    AccessProfile,
    /// Fleet metrics dashboard
    FleetMetrics,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::AccessProfile => f.write_str("access_profile"),
            Component::FleetMetrics => f.write_str("fleet_metrics"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDeclaration {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Privilege {
    Connect,
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Privilege::Connect => f.write_str("CONNECT"),
        }
    }
}

/// Database-level privilege grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantDeclaration {
    pub privilege: Privilege,
    pub database: String,
    pub role: String,
}

/// How guarded commands reach the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub user: String,
    pub group: String,
    pub psql_path: String,
}

/// SQL that runs only while `unless` returns no rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardedCommand {
    pub name: String,
    pub sql: String,
    pub database: String,
    pub connection: ConnectionParams,
    pub unless: String,
}

/// Certificate identity allowed to connect over SSL as `user` to `database`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowListEntry {
    pub user: String,
    pub database: String,
    pub cert_identity: String,
    pub ident_map_path: String,
    pub ipv4_mask: String,
    pub ipv6_mask: String,
}

/// A declared resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resource {
    Export(ExportDeclaration),
    Include { component: Component },
    Role(RoleDeclaration),
    Grant(GrantDeclaration),
    GuardedCommand(GuardedCommand),
    AllowList(AllowListEntry),
}

impl Resource {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Export(_) => ResourceKind::Export,
            Resource::Include { .. } => ResourceKind::Include,
            Resource::Role(_) => ResourceKind::Role,
            Resource::Grant(_) => ResourceKind::Grant,
            Resource::GuardedCommand(_) => ResourceKind::GuardedCommand,
            Resource::AllowList(_) => ResourceKind::AllowList,
        }
    }

    /// Identity of this resource
    #[must_use]
    pub fn reference(&self) -> ResourceRef {
        let title = match self {
            Resource::Export(e) => e.path.clone(),
            Resource::Include { component } => component.to_string(),
            Resource::Role(r) => r.name.clone(),
            Resource::Grant(g) => format!("{} on {} to {}", g.privilege, g.database, g.role),
            Resource::GuardedCommand(c) => c.name.clone(),
            Resource::AllowList(a) => {
                format!("{} as {} on {}", a.cert_identity, a.user, a.database)
            }
        };
        ResourceRef::new(self.kind(), title)
    }
}

/// A resource plus the resources that must be applied before it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub reference: ResourceRef,
    #[serde(flatten)]
    pub resource: Resource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<ResourceRef>,
}

/// Ordered set of declarations for one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    declarations: Vec<Declaration>,
    #[serde(skip)]
    index: HashMap<ResourceRef, usize>,
}

impl PartialEq for Catalog {
    fn eq(&self, other: &Self) -> bool {
        self.declarations == other.declarations
    }
}

impl Eq for Catalog {}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a resource
    ///
    /// # Errors
    /// Returns `Conflict` if a different resource or requirement list was
    /// already declared under the same reference.
    pub fn declare(
        &mut self,
        resource: Resource,
        requires: Vec<ResourceRef>,
    ) -> Result<ResourceRef, CatalogError> {
        let reference = resource.reference();

        if let Some(&existing) = self.index.get(&reference) {
            let existing = &self.declarations[existing];
            if existing.resource == resource && existing.requires == requires {
                return Ok(reference);
            }
            return Err(CatalogError::Conflict(reference));
        }

        self.index.insert(reference.clone(), self.declarations.len());
        self.declarations.push(Declaration {
            reference: reference.clone(),
            resource,
            requires,
        });
        Ok(reference)
    }

    #[must_use]
    pub fn get(&self, reference: &ResourceRef) -> Option<&Declaration> {
        self.index.get(reference).map(|&i| &self.declarations[i])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Declarations in the order they were made
    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter()
    }

    /// Number of declarations of `kind`
    #[must_use]
    pub fn count(&self, kind: ResourceKind) -> usize {
        self.declarations
            .iter()
            .filter(|d| d.reference.kind == kind)
            .count()
    }

    /// Declarations in application order
    ///
    /// Every resource comes after everything it requires. Among resources
    /// that are ready at the same time, declaration order wins, so the
    /// result is stable for identical catalogs.
    ///
    /// # Errors
    /// Returns `MissingDependency` for a requirement that was never declared
    /// and `Cycle` when the requirements cannot be satisfied.
    pub fn ordered(&self) -> Result<Vec<&Declaration>, CatalogError> {
        let n = self.declarations.len();
        let mut pending = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (i, decl) in self.declarations.iter().enumerate() {
            for req in &decl.requires {
                let Some(&j) = self.index.get(req) else {
                    return Err(CatalogError::MissingDependency {
                        resource: decl.reference.clone(),
                        missing: req.clone(),
                    });
                };
                pending[i] += 1;
                dependents[j].push(i);
            }
        }

        let mut ready: BTreeSet<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(n);

        while let Some(i) = ready.pop_first() {
            order.push(&self.declarations[i]);
            for &d in &dependents[i] {
                pending[d] -= 1;
                if pending[d] == 0 {
                    ready.insert(d);
                }
            }
        }

        if order.len() < n {
            let stuck = (0..n)
                .filter(|&i| pending[i] > 0)
                .map(|i| self.declarations[i].reference.clone())
                .collect();
            return Err(CatalogError::Cycle(stuck));
        }

        Ok(order)
    }
}
