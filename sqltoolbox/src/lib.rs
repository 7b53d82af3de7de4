//! Connection-configuration toolbox over sea-orm
//! Builds connection strings, pooled engines, schema bindings and
//! schema-inspection helpers for SQLite, MySQL and PostgreSQL targets

pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod inspect;
pub mod migrate;
pub mod schema;
pub mod spec;

pub use config::DbConfig;
pub use engine::EngineOptions;
pub use error::DbError;
pub use handle::{DatabaseAccess, DatabaseHandle};
pub use inspect::Inspector;
pub use migrate::MigrationBatch;
pub use schema::{DeclaredTables, NamingConvention, SchemaBinding, SchemaDescription, SchemaOrigin};
pub use spec::ConnectionSpec;
