//! fleetgrant-pg: PostgreSQL administration through `psql`
//!
//! Implements [`fleetgrant_core::DatabaseAdmin`] by running `psql` as the
//! database superuser and by maintaining `pg_ident.conf`/`pg_hba.conf`
//! entries for certificate-authenticated access.

pub mod error;
pub mod hba;
pub mod psql;

pub use error::PgError;
pub use psql::PsqlAdmin;
