//! Reconciliation settings

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Inputs that shape a reconciliation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Reporting host; when unset it is looked up in the inventory
    #[serde(default)]
    pub reporting_host: Option<String>,
    /// Nodes allowed to mount exports; when unset every importer node is used
    #[serde(default)]
    pub source_addresses: Option<Vec<String>>,
    /// Declare exports as mounted (`true`) or absent (`false`)
    #[serde(default = "default_exports_enabled")]
    pub exports_enabled: bool,
    /// Class that marks a node as an importer in the inventory
    #[serde(default = "default_importer_class")]
    pub importer_class: String,
    /// Database access settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            reporting_host: None,
            source_addresses: None,
            exports_enabled: default_exports_enabled(),
            importer_class: default_importer_class(),
            database: DatabaseConfig::default(),
        }
    }
}

fn default_exports_enabled() -> bool {
    true
}

fn default_importer_class() -> String {
    "Role::Importer".to_string()
}

impl ReconcileConfig {
    /// Check settings that would otherwise surface as confusing collaborator failures
    ///
    /// # Errors
    /// Returns `ConfigError` naming the first invalid setting.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.importer_class.trim().is_empty() {
            return Err(CoreError::ConfigError("importer_class is empty".to_string()));
        }
        if self.database.superuser.trim().is_empty() {
            return Err(CoreError::ConfigError(
                "database.superuser is empty".to_string(),
            ));
        }
        if self.database.role.trim().is_empty() {
            return Err(CoreError::ConfigError("database.role is empty".to_string()));
        }
        if !self.database.psql_path.starts_with('/') {
            return Err(CoreError::ConfigError(format!(
                "database.psql_path must be absolute: {}",
                self.database.psql_path
            )));
        }
        Ok(())
    }
}

/// Database superuser and client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Account guarded commands run as
    #[serde(default = "default_superuser")]
    pub superuser: String,
    /// Group for that account, defaults to the account name
    #[serde(default)]
    pub group: Option<String>,
    /// Path to the `psql` binary
    #[serde(default = "default_psql_path")]
    pub psql_path: String,
    /// Read-only role granted to the reporting host
    #[serde(default = "default_role")]
    pub role: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            superuser: default_superuser(),
            group: None,
            psql_path: default_psql_path(),
            role: default_role(),
        }
    }
}

impl DatabaseConfig {
    /// Effective group of the superuser account
    #[must_use]
    pub fn group(&self) -> &str {
        self.group
            .as_deref()
            .filter(|g| !g.is_empty())
            .unwrap_or(&self.superuser)
    }
}

fn default_superuser() -> String {
    "pe-postgres".to_string()
}

fn default_psql_path() -> String {
    "/opt/puppetlabs/server/bin/psql".to_string()
}

fn default_role() -> String {
    "fleetgrant_reader".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReconcileConfig::default();
        assert!(config.exports_enabled);
        assert!(config.reporting_host.is_none());
        assert_eq!(config.database.superuser, "pe-postgres");
        assert_eq!(config.database.group(), "pe-postgres");
        assert_eq!(config.database.psql_path, "/opt/puppetlabs/server/bin/psql");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_group_override() {
        let db = DatabaseConfig {
            group: Some("postgres".to_string()),
            ..DatabaseConfig::default()
        };
        assert_eq!(db.group(), "postgres");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ReconcileConfig = serde_json::from_str(
            r#"{"reporting_host": "report.example", "database": {"superuser": "postgres"}}"#,
        )
        .unwrap();
        assert_eq!(config.reporting_host.as_deref(), Some("report.example"));
        assert_eq!(config.database.group(), "postgres");
        assert_eq!(config.database.role, "fleetgrant_reader");
        assert!(config.exports_enabled);
    }

    #[test]
    fn test_validate_relative_psql_path() {
        let mut config = ReconcileConfig::default();
        config.database.psql_path = "psql".to_string();
        assert!(matches!(config.validate(), Err(CoreError::ConfigError(_))));
    }
}
