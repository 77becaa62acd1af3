//! Node facts consumed by a reconciliation run

use serde::{Deserialize, Serialize};

/// PostgreSQL version assumed when the node does not report one
pub const DEFAULT_POSTGRES_VERSION: &str = "9.4";

/// Facts about the node being reconciled, gathered once per run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFacts {
    /// Fully-qualified node identifier
    pub certname: String,
    /// Present when the node hosts the database engine
    #[serde(default)]
    pub postgresql: Option<PostgresqlInfo>,
    /// Present on core platform nodes
    #[serde(default)]
    pub platform_version: Option<String>,
}

/// Database engine facts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresqlInfo {
    #[serde(default)]
    pub installed_server_version: Option<String>,
}

impl NodeFacts {
    /// Create facts for a node with nothing installed
    pub fn new(certname: impl Into<String>) -> Self {
        Self {
            certname: certname.into(),
            ..Self::default()
        }
    }

    /// Mark the node as a database host running `version`
    #[must_use]
    pub fn with_postgresql(mut self, version: impl Into<String>) -> Self {
        self.postgresql = Some(PostgresqlInfo {
            installed_server_version: Some(version.into()),
        });
        self
    }

    /// Mark the node as a core platform node
    #[must_use]
    pub fn with_platform(mut self, version: impl Into<String>) -> Self {
        self.platform_version = Some(version.into());
        self
    }

    fn installed_version(&self) -> Option<&str> {
        self.postgresql
            .as_ref()
            .and_then(|pg| pg.installed_server_version.as_deref())
            .filter(|v| !v.is_empty())
    }

    /// Whether the database engine is installed with a known version
    #[must_use]
    pub fn is_database_host(&self) -> bool {
        self.installed_version().is_some()
    }

    #[must_use]
    pub fn is_core_platform(&self) -> bool {
        self.platform_version.is_some()
    }

    /// Installed PostgreSQL version, or [`DEFAULT_POSTGRES_VERSION`]
    #[must_use]
    pub fn postgres_version(&self) -> &str {
        self.installed_version().unwrap_or(DEFAULT_POSTGRES_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_defaults_when_absent() {
        let facts = NodeFacts::new("db.example");
        assert!(!facts.is_database_host());
        assert_eq!(facts.postgres_version(), "9.4");
    }

    #[test]
    fn test_version_defaults_when_empty() {
        let facts = NodeFacts::new("db.example").with_postgresql("");
        assert!(!facts.is_database_host());
        assert_eq!(facts.postgres_version(), "9.4");
    }

    #[test]
    fn test_version_reported() {
        let facts = NodeFacts::new("db.example").with_postgresql("11");
        assert!(facts.is_database_host());
        assert_eq!(facts.postgres_version(), "11");
    }

    #[test]
    fn test_deserialize_minimal() {
        let facts: NodeFacts = serde_json::from_str(r#"{"certname": "a.example"}"#).unwrap();
        assert_eq!(facts, NodeFacts::new("a.example"));
        assert!(!facts.is_core_platform());
    }
}
