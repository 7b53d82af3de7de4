//! Schema inspection module
//! Read-only table and catalog-name queries against a bound engine

use std::collections::BTreeSet;
use std::sync::Arc;

use log::error;
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, Statement};

use crate::schema::SchemaDescription;
use crate::DbError;

/// Read-only inspection surface over one engine. The inspector keeps the
/// engine it was attached to; swapping the owning handle's engine later does
/// not re-derive it.
pub struct Inspector {
    engine: Arc<DatabaseConnection>,
}

impl Inspector {
    /// Attaches to an engine, pinging it so an unreachable target fails the
    /// enclosing handle construction instead of lingering half-built.
    pub async fn connect(engine: Arc<DatabaseConnection>) -> Result<Self, DbError> {
        if let Err(e) = engine.ping().await {
            error!("Could not attach inspector to engine: {}", e);
            return Err(DbError::Connection(e.to_string()));
        }
        Ok(Self { engine })
    }

    /// Table names recorded in the bound schema snapshot. This is not a live
    /// catalog query and may be stale relative to the database.
    pub fn table_names(&self, schema: &SchemaDescription) -> BTreeSet<String> {
        schema.table_names()
    }

    /// Live catalog-name enumeration, filtered by optional prefix and
    /// suffix. Order is whatever the backend's catalog returns.
    pub async fn database_names(
        &self,
        starts_with: Option<&str>,
        ends_with: Option<&str>,
    ) -> Result<Vec<String>, DbError> {
        let backend = self.engine.get_database_backend();
        let (sql, column) = match backend {
            DatabaseBackend::MySql => ("SHOW DATABASES", "Database"),
            DatabaseBackend::Postgres => {
                ("SELECT datname FROM pg_database WHERE datistemplate = false", "datname")
            }
            DatabaseBackend::Sqlite => ("PRAGMA database_list", "name"),
        };

        let rows = self
            .engine
            .query_all(Statement::from_string(backend, sql.to_owned()))
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let mut names = Vec::with_capacity(rows.len());
        for row in rows {
            names.push(row.try_get::<String>("", column).map_err(DbError::from)?);
        }
        if let Some(prefix) = starts_with {
            names.retain(|name| name.starts_with(prefix));
        }
        if let Some(suffix) = ends_with {
            names.retain(|name| name.ends_with(suffix));
        }
        Ok(names)
    }
}
