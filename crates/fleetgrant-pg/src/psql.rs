//! `psql`-backed database administrator

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleetgrant_core::{
    AllowListEntry, BoxError, ConnectionParams, DatabaseAdmin, GrantDeclaration, GuardOutcome,
    GuardedCommand, RoleDeclaration,
};
use fleetgrant_exec::{CommandExecutor, shell_quote};
use tracing::{debug, info, instrument};

use crate::error::PgError;
use crate::hba::{hba_lines, hba_path, ident_line, merge_hba_rules};

/// Maintenance database used for cluster-wide statements
const ADMIN_DATABASE: &str = "postgres";

/// Database administrator that shells out to `psql`
pub struct PsqlAdmin {
    /// Executor running commands on the database host
    executor: Arc<dyn CommandExecutor>,
    /// Superuser connection for role and grant statements
    connection: ConnectionParams,
    /// Per-command timeout
    timeout: Duration,
}

impl PsqlAdmin {
    /// Create a new administrator
    ///
    /// # Arguments
    /// * `executor` - Executor for running `psql` and file edits
    /// * `connection` - Superuser account, group and `psql` path
    pub fn new(executor: Arc<dyn CommandExecutor>, connection: ConnectionParams) -> Self {
        Self {
            executor,
            connection,
            timeout: Duration::from_secs(60),
        }
    }

    /// Set per-command timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a `psql` invocation running `sql` as the superuser
    fn psql_cmd(connection: &ConnectionParams, database: &str, sql: &str) -> String {
        format!(
            "runuser -u {} -g {} -- {} --no-psqlrc --tuples-only --no-align \
             --set ON_ERROR_STOP=1 --dbname {} --command {}",
            shell_quote(&connection.user),
            shell_quote(&connection.group),
            shell_quote(&connection.psql_path),
            shell_quote(database),
            shell_quote(sql),
        )
    }

    /// Run `sql` and return its trimmed output
    async fn query(
        &self,
        connection: &ConnectionParams,
        database: &str,
        sql: &str,
    ) -> Result<String, PgError> {
        let cmd = Self::psql_cmd(connection, database, sql);
        let result = self.executor.run_with_timeout(&cmd, self.timeout).await?;

        if !result.success() {
            return Err(PgError::QueryFailed {
                database: database.to_string(),
                message: result.stderr.trim().to_string(),
            });
        }

        Ok(result.stdout.trim().to_string())
    }

    /// Whether `sql` returns at least one row
    async fn returns_rows(
        &self,
        connection: &ConnectionParams,
        database: &str,
        sql: &str,
    ) -> Result<bool, PgError> {
        Ok(!self.query(connection, database, sql).await?.is_empty())
    }

    /// Append `line` to `path` unless an identical line exists
    ///
    /// Returns whether the file changed.
    async fn ensure_line(&self, path: &str, line: &str) -> Result<bool, PgError> {
        let present = self
            .executor
            .run_with_timeout(
                &format!("grep -qxF -- {} {}", shell_quote(line), shell_quote(path)),
                self.timeout,
            )
            .await?;
        match present.status {
            0 => return Ok(false),
            1 => {}
            _ => {
                return Err(PgError::ConfigFile {
                    path: path.to_string(),
                    message: present.stderr.trim().to_string(),
                });
            }
        }

        let append = self
            .executor
            .run_with_timeout(
                &format!(
                    "printf '%s\\n' {} >> {}",
                    shell_quote(line),
                    shell_quote(path)
                ),
                self.timeout,
            )
            .await?;
        if !append.success() {
            return Err(PgError::ConfigFile {
                path: path.to_string(),
                message: append.stderr.trim().to_string(),
            });
        }

        debug!(path, line, "appended line");
        Ok(true)
    }

    /// Merge `rules` into the managed block at the top of `pg_hba.conf`
    ///
    /// Returns whether the file changed.
    async fn ensure_hba_rules(&self, path: &str, rules: &[String]) -> Result<bool, PgError> {
        let read = self
            .executor
            .run_with_timeout(&format!("cat -- {}", shell_quote(path)), self.timeout)
            .await?;
        if !read.success() {
            return Err(PgError::ConfigFile {
                path: path.to_string(),
                message: read.stderr.trim().to_string(),
            });
        }

        let desired = merge_hba_rules(&read.stdout, rules);
        if desired == read.stdout {
            return Ok(false);
        }

        let write = self
            .executor
            .run_with_timeout(
                &format!(
                    "printf '%s' {} > {}",
                    shell_quote(&desired),
                    shell_quote(path)
                ),
                self.timeout,
            )
            .await?;
        if !write.success() {
            return Err(PgError::ConfigFile {
                path: path.to_string(),
                message: write.stderr.trim().to_string(),
            });
        }

        debug!(path, "access rules updated");
        Ok(true)
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait]
impl DatabaseAdmin for PsqlAdmin {
    #[instrument(skip(self), fields(role = %role.name))]
    async fn create_role(&self, role: &RoleDeclaration) -> Result<(), BoxError> {
        let exists = format!(
            "SELECT 1 FROM pg_roles WHERE rolname = {}",
            quote_literal(&role.name)
        );
        if self
            .returns_rows(&self.connection, ADMIN_DATABASE, &exists)
            .await?
        {
            debug!("role already exists");
            return Ok(());
        }

        let create = format!("CREATE ROLE {} WITH LOGIN", quote_ident(&role.name));
        self.query(&self.connection, ADMIN_DATABASE, &create).await?;
        info!("role created");
        Ok(())
    }

    #[instrument(skip(self), fields(database = %grant.database))]
    async fn grant_privilege(&self, grant: &GrantDeclaration) -> Result<(), BoxError> {
        // GRANT is a no-op when the privilege is already held
        let sql = format!(
            "GRANT {} ON DATABASE {} TO {}",
            grant.privilege,
            quote_ident(&grant.database),
            quote_ident(&grant.role)
        );
        self.query(&self.connection, ADMIN_DATABASE, &sql).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(name = %command.name))]
    async fn run_guarded_command(
        &self,
        command: &GuardedCommand,
    ) -> Result<GuardOutcome, BoxError> {
        if self
            .returns_rows(&command.connection, &command.database, &command.unless)
            .await?
        {
            debug!("guard satisfied, skipping");
            return Ok(GuardOutcome::Skipped);
        }

        self.query(&command.connection, &command.database, &command.sql)
            .await?;
        info!("guarded command executed");
        Ok(GuardOutcome::Executed)
    }

    #[instrument(skip(self), fields(database = %entry.database, cert = %entry.cert_identity))]
    async fn declare_allow_list_entry(&self, entry: &AllowListEntry) -> Result<(), BoxError> {
        let hba = hba_path(&entry.ident_map_path)?;

        let mut changed = self
            .ensure_line(&entry.ident_map_path, &ident_line(entry))
            .await?;
        changed |= self.ensure_hba_rules(&hba, &hba_lines(entry)).await?;

        if changed {
            self.query(&self.connection, ADMIN_DATABASE, "SELECT pg_reload_conf()")
                .await?;
            info!("allow-list updated, configuration reloaded");
        }
        Ok(())
    }
}
