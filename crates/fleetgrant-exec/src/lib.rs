//! fleetgrant-exec: Command execution abstraction
//!
//! Runs shell commands on the node being reconciled. Collaborator adapters
//! (database administration, exports) drive their work through
//! [`CommandExecutor`] so tests can substitute a recording executor.

pub mod error;
pub mod local;
pub mod result;
pub mod traits;

pub use error::ExecError;
pub use local::LocalExecutor;
pub use result::CommandResult;
pub use traits::CommandExecutor;

/// Quote a value for inclusion in a `sh -c` command line
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\"'\"'"))
}
