//! Collaborators used by `fleetgrant apply`

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fleetgrant_core::{
    BoxError, Component, ComponentInstaller, Ensure, ExportDeclaration, ExportManager,
};
use fleetgrant_exec::CommandExecutor;
use tracing::{debug, info, instrument};

/// Maintains one exports file, a block per exported tree
///
/// Each block is a comment line carrying the tag, the reporting host's mount
/// point and mount options, followed by the export line itself.
pub struct ExportsTable {
    path: PathBuf,
    reload_command: String,
    executor: Arc<dyn CommandExecutor>,
}

impl ExportsTable {
    pub fn new(
        path: impl Into<PathBuf>,
        reload_command: impl Into<String>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        Self {
            path: path.into(),
            reload_command: reload_command.into(),
            executor,
        }
    }
}

fn header_line(export: &ExportDeclaration) -> String {
    format!(
        "# {} mount={} options={}",
        export.tag, export.mount_point, export.options
    )
}

fn export_line(export: &ExportDeclaration) -> String {
    format!("{}{}", export.path, export.clients)
}

/// Rewrite `current` so it holds exactly the desired block for `export.path`
///
/// Only tagged blocks are replaced; export lines without the tag header belong
/// to someone else and are kept.
fn render(current: &str, export: &ExportDeclaration) -> String {
    let prefix = format!("{} ", export.path);
    let tag = format!("# {} ", export.tag);
    let lines: Vec<&str> = current.lines().collect();

    let mut kept = Vec::with_capacity(lines.len() + 2);
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        let is_header = line.starts_with(&tag)
            && lines.get(i + 1).is_some_and(|next| next.starts_with(&prefix));
        if is_header {
            i += 2;
            continue;
        }
        kept.push(line.to_string());
        i += 1;
    }

    if export.ensure == Ensure::Mounted {
        kept.push(header_line(export));
        kept.push(export_line(export));
    }

    let mut out = kept.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

#[async_trait]
impl ExportManager for ExportsTable {
    #[instrument(skip(self, export), fields(path = %export.path, ensure = ?export.ensure))]
    async fn declare(&self, export: &ExportDeclaration) -> Result<(), BoxError> {
        let current = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };

        let desired = render(&current, export);
        if desired == current {
            debug!("export already in desired state");
            return Ok(());
        }

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&self.path, desired).await?;
        self.executor
            .run(&self.reload_command)
            .await?
            .into_success()?;

        info!("exports updated");
        Ok(())
    }
}

/// Components installed by their own tooling; inclusion is only recorded
#[derive(Debug, Default)]
pub struct ExternalComponents;

#[async_trait]
impl ComponentInstaller for ExternalComponents {
    async fn include(&self, component: Component) -> Result<(), BoxError> {
        info!(%component, "component included, installation is managed externally");
        Ok(())
    }
}
