/*
 * Copyright (c) SQL Toolbox Authors. 2025. All rights reserved.
 * SQL Toolbox is licensed under the Mulan PSL v2.
 * You can use this software according to the terms and conditions of the Mulan PSL v2.
 * You may obtain a copy of Mulan PSL v2 at:
 *     http://license.coscl.org.cn/MulanPSL2
 * THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND, EITHER EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR
 * PURPOSE.
 * See the Mulan PSL v2 for more details.
 */

//! Schema binding module
//! Associates an engine with a schema snapshot, either declared ahead of
//! time from entity definitions or reflected from the live catalog

use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use sea_orm::sea_query::{TableCreateStatement, TableRef};
use sea_orm::{ConnectionTrait, DatabaseBackend, DatabaseConnection, EntityTrait, Schema, Statement};

use crate::DbError;

type TableBuilder = Box<dyn Fn(&Schema) -> TableCreateStatement + Send + Sync>;

/// Ordered set of entity-derived table definitions for a declared binding.
/// Register entities in dependency order so that table creation can run
/// front to back.
#[derive(Default)]
pub struct DeclaredTables {
    builders: Vec<TableBuilder>,
}

impl DeclaredTables {
    pub fn new() -> Self {
        Self { builders: Vec::new() }
    }

    pub fn entity<E>(mut self, entity: E) -> Self
    where
        E: EntityTrait + Send + Sync,
    {
        self.builders.push(Box::new(move |schema| schema.create_table_from_entity(entity)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    fn statements(&self, backend: DatabaseBackend) -> Vec<TableCreateStatement> {
        let schema = Schema::new(backend);
        self.builders.iter().map(|build| build(&schema)).collect()
    }
}

/// Constraint naming policy handed to migration tooling alongside the
/// schema snapshot, so generated constraint and index names stay stable
/// across databases.
#[derive(Debug, Clone, Default)]
pub struct NamingConvention;

impl NamingConvention {
    pub fn index(&self, table: &str, column: &str) -> String {
        format!("ix_{}_{}", table, column)
    }

    pub fn unique(&self, table: &str, column: &str) -> String {
        format!("uq_{}_{}", table, column)
    }

    pub fn check(&self, table: &str, constraint: &str) -> String {
        format!("ck_{}_{}", table, constraint)
    }

    pub fn foreign_key(&self, table: &str, column: &str, referred_table: &str) -> String {
        format!("fk_{}_{}_{}", table, column, referred_table)
    }

    pub fn primary_key(&self, table: &str) -> String {
        format!("pk_{}", table)
    }
}

/// Where a schema snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOrigin {
    Declared,
    Reflected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub column: String,
    pub referred_table: String,
    pub referred_column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub foreign_keys: Vec<ForeignKeyInfo>,
}

/// Immutable schema snapshot bound to a handle. For reflected bindings this
/// mirrors the live catalog at bind time only; later DDL run by other
/// processes is not picked up.
#[derive(Debug, Clone)]
pub struct SchemaDescription {
    origin: SchemaOrigin,
    tables: BTreeMap<String, TableInfo>,
    naming: NamingConvention,
}

impl SchemaDescription {
    pub fn origin(&self) -> SchemaOrigin {
        self.origin
    }

    pub fn table_names(&self) -> BTreeSet<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(name)
    }

    pub fn naming(&self) -> &NamingConvention {
        &self.naming
    }
}

/// Schema strategy selected at handle construction
pub enum SchemaBinding {
    /// Application-defined table set; optionally issues idempotent
    /// `CREATE TABLE IF NOT EXISTS` DDL at bind time. Intended for first-run
    /// bootstrap only, never for ongoing schema evolution.
    Declared {
        tables: DeclaredTables,
        create_tables: bool,
    },
    /// Snapshot of whatever the live catalog holds at bind time
    Reflected,
}

impl SchemaBinding {
    pub fn declared(tables: DeclaredTables, create_tables: bool) -> Self {
        SchemaBinding::Declared { tables, create_tables }
    }

    /// Bind against the engine, producing the schema snapshot. A reflection
    /// failure leaves nothing half-built; the caller must abort.
    pub async fn bind(self, engine: &DatabaseConnection) -> Result<SchemaDescription, DbError> {
        match self {
            SchemaBinding::Declared { tables, create_tables } => {
                bind_declared(engine, &tables, create_tables).await
            }
            SchemaBinding::Reflected => {
                let tables = reflect(engine).await.map_err(classify_reflect_error)?;
                Ok(SchemaDescription {
                    origin: SchemaOrigin::Reflected,
                    tables,
                    naming: NamingConvention,
                })
            }
        }
    }
}

async fn bind_declared(
    engine: &DatabaseConnection,
    tables: &DeclaredTables,
    create_tables: bool,
) -> Result<SchemaDescription, DbError> {
    let backend = engine.get_database_backend();
    let statements = tables.statements(backend);

    if create_tables {
        warn!("Creating declared tables directly; this can conflict with an external migration tool owning the same schema");
        for stmt in &statements {
            let mut stmt = stmt.clone();
            stmt.if_not_exists();
            engine.execute(backend.build(&stmt)).await.map_err(DbError::from)?;
        }
        info!("Declared table creation finished ({} tables)", statements.len());
    }

    let mut snapshot = BTreeMap::new();
    for stmt in &statements {
        if let Some(name) = created_table_name(stmt) {
            snapshot.insert(
                name.clone(),
                TableInfo { name, ..TableInfo::default() },
            );
        }
    }
    Ok(SchemaDescription {
        origin: SchemaOrigin::Declared,
        tables: snapshot,
        naming: NamingConvention,
    })
}

// An unreachable target during reflection is a connection failure, not a
// catalog-interpretation failure.
fn classify_reflect_error(err: sea_orm::DbErr) -> DbError {
    match err {
        sea_orm::DbErr::Conn(e) => DbError::Connection(e.to_string()),
        sea_orm::DbErr::ConnectionAcquire(e) => DbError::Connection(e.to_string()),
        other => DbError::Reflection(other.to_string()),
    }
}

// PRAGMA arguments cannot be bound, so the identifier is quoted by hand.
fn quote_sqlite_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn created_table_name(stmt: &TableCreateStatement) -> Option<String> {
    match stmt.get_table_name() {
        Some(TableRef::Table(iden)) => Some(iden.to_string()),
        _ => None,
    }
}

async fn reflect(engine: &DatabaseConnection) -> Result<BTreeMap<String, TableInfo>, sea_orm::DbErr> {
    let backend = engine.get_database_backend();
    info!("Reflecting live schema through {:?} catalog queries", backend);
    match backend {
        DatabaseBackend::Sqlite => reflect_sqlite(engine).await,
        DatabaseBackend::MySql => reflect_mysql(engine).await,
        DatabaseBackend::Postgres => reflect_postgres(engine).await,
    }
}

async fn reflect_sqlite(db: &DatabaseConnection) -> Result<BTreeMap<String, TableInfo>, sea_orm::DbErr> {
    let backend = DatabaseBackend::Sqlite;
    let rows = db
        .query_all(Statement::from_string(
            backend,
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'".to_owned(),
        ))
        .await?;

    let mut tables = BTreeMap::new();
    for row in rows {
        let name: String = row.try_get("", "name")?;
        let mut table = TableInfo { name: name.clone(), ..TableInfo::default() };

        let columns = db
            .query_all(Statement::from_string(backend, format!("PRAGMA table_info({})", quote_sqlite_ident(&name))))
            .await?;
        for column in columns {
            let notnull: i64 = column.try_get("", "notnull")?;
            let pk: i64 = column.try_get("", "pk")?;
            table.columns.push(ColumnInfo {
                name: column.try_get("", "name")?,
                data_type: column.try_get("", "type")?,
                nullable: notnull == 0,
                primary_key: pk > 0,
            });
        }

        let foreign_keys = db
            .query_all(Statement::from_string(backend, format!("PRAGMA foreign_key_list({})", quote_sqlite_ident(&name))))
            .await?;
        for fk in foreign_keys {
            // "to" is NULL when the reference targets the parent's primary key
            let referred_column: Option<String> = fk.try_get("", "to")?;
            table.foreign_keys.push(ForeignKeyInfo {
                column: fk.try_get("", "from")?,
                referred_table: fk.try_get("", "table")?,
                referred_column: referred_column.unwrap_or_default(),
            });
        }

        tables.insert(name, table);
    }
    Ok(tables)
}

async fn reflect_mysql(db: &DatabaseConnection) -> Result<BTreeMap<String, TableInfo>, sea_orm::DbErr> {
    let backend = DatabaseBackend::MySql;
    let rows = db
        .query_all(Statement::from_string(
            backend,
            "SELECT TABLE_NAME FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() ORDER BY TABLE_NAME"
                .to_owned(),
        ))
        .await?;

    let mut tables = BTreeMap::new();
    for row in rows {
        let name: String = row.try_get("", "TABLE_NAME")?;
        let mut table = TableInfo { name: name.clone(), ..TableInfo::default() };

        let columns = db
            .query_all(Statement::from_sql_and_values(
                backend,
                "SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_KEY \
                 FROM information_schema.COLUMNS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
                 ORDER BY ORDINAL_POSITION",
                [name.clone().into()],
            ))
            .await?;
        for column in columns {
            let is_nullable: String = column.try_get("", "IS_NULLABLE")?;
            let column_key: String = column.try_get("", "COLUMN_KEY")?;
            table.columns.push(ColumnInfo {
                name: column.try_get("", "COLUMN_NAME")?,
                data_type: column.try_get("", "COLUMN_TYPE")?,
                nullable: is_nullable == "YES",
                primary_key: column_key == "PRI",
            });
        }

        let foreign_keys = db
            .query_all(Statement::from_sql_and_values(
                backend,
                "SELECT COLUMN_NAME, REFERENCED_TABLE_NAME, REFERENCED_COLUMN_NAME \
                 FROM information_schema.KEY_COLUMN_USAGE \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
                 AND REFERENCED_TABLE_NAME IS NOT NULL",
                [name.clone().into()],
            ))
            .await?;
        for fk in foreign_keys {
            table.foreign_keys.push(ForeignKeyInfo {
                column: fk.try_get("", "COLUMN_NAME")?,
                referred_table: fk.try_get("", "REFERENCED_TABLE_NAME")?,
                referred_column: fk.try_get("", "REFERENCED_COLUMN_NAME")?,
            });
        }

        tables.insert(name, table);
    }
    Ok(tables)
}

async fn reflect_postgres(db: &DatabaseConnection) -> Result<BTreeMap<String, TableInfo>, sea_orm::DbErr> {
    let backend = DatabaseBackend::Postgres;
    let rows = db
        .query_all(Statement::from_string(
            backend,
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
             ORDER BY table_name"
                .to_owned(),
        ))
        .await?;

    let mut tables = BTreeMap::new();
    for row in rows {
        let name: String = row.try_get("", "table_name")?;
        let mut table = TableInfo { name: name.clone(), ..TableInfo::default() };

        let pk_rows = db
            .query_all(Statement::from_sql_and_values(
                backend,
                "SELECT kcu.column_name FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                 ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema \
                 WHERE tc.table_schema = 'public' AND tc.table_name = $1 \
                 AND tc.constraint_type = 'PRIMARY KEY'",
                [name.clone().into()],
            ))
            .await?;
        let mut primary_keys = BTreeSet::new();
        for pk in pk_rows {
            primary_keys.insert(pk.try_get::<String>("", "column_name")?);
        }

        let columns = db
            .query_all(Statement::from_sql_and_values(
                backend,
                "SELECT column_name, data_type, is_nullable \
                 FROM information_schema.columns \
                 WHERE table_schema = 'public' AND table_name = $1 \
                 ORDER BY ordinal_position",
                [name.clone().into()],
            ))
            .await?;
        for column in columns {
            let column_name: String = column.try_get("", "column_name")?;
            let is_nullable: String = column.try_get("", "is_nullable")?;
            table.columns.push(ColumnInfo {
                primary_key: primary_keys.contains(&column_name),
                name: column_name,
                data_type: column.try_get("", "data_type")?,
                nullable: is_nullable == "YES",
            });
        }

        let foreign_keys = db
            .query_all(Statement::from_sql_and_values(
                backend,
                "SELECT kcu.column_name, ccu.table_name AS referred_table, \
                 ccu.column_name AS referred_column \
                 FROM information_schema.table_constraints tc \
                 JOIN information_schema.key_column_usage kcu \
                 ON kcu.constraint_name = tc.constraint_name AND kcu.table_schema = tc.table_schema \
                 JOIN information_schema.constraint_column_usage ccu \
                 ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema \
                 WHERE tc.table_schema = 'public' AND tc.table_name = $1 \
                 AND tc.constraint_type = 'FOREIGN KEY'",
                [name.clone().into()],
            ))
            .await?;
        for fk in foreign_keys {
            table.foreign_keys.push(ForeignKeyInfo {
                column: fk.try_get("", "column_name")?,
                referred_table: fk.try_get("", "referred_table")?,
                referred_column: fk.try_get("", "referred_column")?,
            });
        }

        tables.insert(name, table);
    }
    Ok(tables)
}
