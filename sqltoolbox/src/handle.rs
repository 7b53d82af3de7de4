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

//! Database handle module
//! Composition root tying one spec, one engine, one schema snapshot and one
//! inspector together behind a single session/engine/schema surface

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, TransactionError,
    TransactionTrait,
};

use crate::engine::{self, EngineOptions};
use crate::inspect::Inspector;
use crate::schema::{SchemaBinding, SchemaDescription};
use crate::spec::ConnectionSpec;
use crate::DbError;

/// Narrow capability surface for components that need database access:
/// an engine, the bound schema snapshot and fresh sessions. Depend on this
/// trait, not on [`DatabaseHandle`] itself.
#[async_trait]
pub trait DatabaseAccess: Send + Sync {
    fn engine(&self) -> &Arc<DatabaseConnection>;
    fn schema(&self) -> &SchemaDescription;
    async fn session(&self) -> Result<DatabaseTransaction, DbError>;
}

/// One connection target: spec, engine, schema snapshot and inspector, all
/// derived from the same spec at construction. Construction either fully
/// succeeds or fails; no half-initialized handle is ever returned.
pub struct DatabaseHandle {
    spec: ConnectionSpec,
    engine: Arc<DatabaseConnection>,
    schema: SchemaDescription,
    inspector: Inspector,
    options: EngineOptions,
}

impl DatabaseHandle {
    /// Builds the engine, binds the schema and attaches the inspector.
    ///
    /// Engine construction itself is lazy, so the first I/O happens during
    /// schema binding (reflected variants) or the inspector's ping; any of
    /// those failing aborts the whole construction.
    pub async fn connect(
        spec: ConnectionSpec,
        binding: SchemaBinding,
        options: EngineOptions,
    ) -> Result<Self, DbError> {
        let engine = Arc::new(engine::create_engine(&spec, None, &options).await?);
        let schema = binding.bind(&engine).await?;
        let inspector = Inspector::connect(Arc::clone(&engine)).await?;
        Ok(Self { spec, engine, schema, inspector, options })
    }

    pub fn spec(&self) -> &ConnectionSpec {
        &self.spec
    }

    /// Canonical connection string, recomputed from the held spec. Stays
    /// consistent with the spec regardless of which engine is attached.
    pub fn connection_string(&self) -> String {
        self.spec.connection_string()
    }

    /// The bound schema snapshot.
    pub fn base(&self) -> &SchemaDescription {
        &self.schema
    }

    pub fn engine(&self) -> &Arc<DatabaseConnection> {
        &self.engine
    }

    /// Replaces the engine, e.g. to point at a sibling database. The
    /// replacement must speak the spec's backend; schema snapshot and
    /// inspector are deliberately not re-derived and may go stale.
    pub fn set_engine(&mut self, engine: Arc<DatabaseConnection>) -> Result<(), DbError> {
        let expected = self.spec.backend()?;
        let actual = engine.get_database_backend();
        if actual != expected {
            return Err(DbError::EngineMismatch { expected, actual });
        }
        self.engine = engine;
        Ok(())
    }

    /// Fresh transactional session per call; the caller commits. Dropping
    /// the session without committing rolls it back.
    pub async fn session(&self) -> Result<DatabaseTransaction, DbError> {
        self.engine.begin().await.map_err(DbError::from)
    }

    /// Scoped session that commits when `f` returns `Ok` and rolls back when
    /// it returns `Err`.
    pub async fn autocommit_session<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: for<'c> FnOnce(
                &'c DatabaseTransaction,
            ) -> Pin<Box<dyn Future<Output = Result<T, DbErr>> + Send + 'c>>
            + Send,
        T: Send,
    {
        self.engine.transaction(f).await.map_err(|e| match e {
            TransactionError::Connection(err) => DbError::Connection(err.to_string()),
            TransactionError::Transaction(err) => DbError::from(err),
        })
    }

    /// Table names from the bound schema snapshot.
    pub fn get_table_names(&self) -> BTreeSet<String> {
        self.inspector.table_names(&self.schema)
    }

    /// Live catalog names visible to this credential, optionally filtered.
    pub async fn get_database_names(
        &self,
        starts_with: Option<&str>,
        ends_with: Option<&str>,
    ) -> Result<Vec<String>, DbError> {
        self.inspector.database_names(starts_with, ends_with).await
    }

    /// New engine reusing this spec's credentials, against `name` when given.
    pub async fn generate_engine(&self, name: Option<&str>) -> Result<DatabaseConnection, DbError> {
        engine::create_engine(&self.spec, name, &self.options).await
    }

    /// One engine per sibling database name, sharing this spec's credentials.
    pub async fn get_engines_from_list(
        &self,
        names: &[String],
    ) -> Result<HashMap<String, Arc<DatabaseConnection>>, DbError> {
        engine::create_engines_for_names(&self.spec, names, &self.options).await
    }

    /// Fail-fast reachability check against the current engine.
    pub async fn ping(&self) -> Result<(), DbError> {
        engine::ping(&self.engine).await
    }
}

#[async_trait]
impl DatabaseAccess for DatabaseHandle {
    fn engine(&self) -> &Arc<DatabaseConnection> {
        &self.engine
    }

    fn schema(&self) -> &SchemaDescription {
        &self.schema
    }

    async fn session(&self) -> Result<DatabaseTransaction, DbError> {
        self.engine.begin().await.map_err(DbError::from)
    }
}
