//! Migration batch module
//! Opens one transaction per sibling database so an external migration
//! runner can apply work to all of them and commit or roll back as a unit

use std::collections::HashMap;
use std::sync::Arc;

use log::{error, info};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};

use crate::DbError;

/// A set of open transactions, one per database, committed or rolled back
/// together. Dropping the batch without committing rolls every transaction
/// back; connection release is unconditional either way.
#[derive(Debug)]
pub struct MigrationBatch {
    // Engines outlive their transactions; kept here for per-database access.
    engines: HashMap<String, Arc<DatabaseConnection>>,
    transactions: Vec<(String, DatabaseTransaction)>,
}

impl MigrationBatch {
    /// Begins one transaction on every engine. If any begin fails, the
    /// already-open transactions are rolled back before the error returns.
    pub async fn begin(engines: HashMap<String, Arc<DatabaseConnection>>) -> Result<Self, DbError> {
        let mut transactions = Vec::with_capacity(engines.len());
        for (name, engine) in &engines {
            match engine.begin().await {
                Ok(txn) => {
                    info!("Opened migration transaction for {}", name);
                    transactions.push((name.clone(), txn));
                }
                Err(e) => {
                    error!("Could not begin transaction on {}: {}", name, e);
                    rollback_all(transactions).await;
                    return Err(DbError::MigrationBatch(format!("begin failed on {}: {}", name, e)));
                }
            }
        }
        Ok(Self { engines, transactions })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.transactions.iter().map(|(name, _)| name.as_str())
    }

    pub fn transaction(&self, name: &str) -> Option<&DatabaseTransaction> {
        self.transactions.iter().find(|(n, _)| n == name).map(|(_, txn)| txn)
    }

    pub fn engine(&self, name: &str) -> Option<&Arc<DatabaseConnection>> {
        self.engines.get(name)
    }

    /// Commits every transaction. On the first failure the remaining open
    /// transactions are rolled back and the batch error is returned after
    /// cleanup; transactions already committed at that point stay committed.
    pub async fn commit(mut self) -> Result<(), DbError> {
        while let Some((name, txn)) = self.transactions.pop() {
            info!("Committing migration transaction for {}", name);
            if let Err(e) = txn.commit().await {
                error!("Commit failed on {}: {}", name, e);
                rollback_all(std::mem::take(&mut self.transactions)).await;
                return Err(DbError::MigrationBatch(format!("commit failed on {}: {}", name, e)));
            }
        }
        Ok(())
    }

    /// Rolls back every transaction, reporting the first failure after all
    /// of them have been attempted.
    pub async fn rollback(mut self) -> Result<(), DbError> {
        let mut first_error = None;
        while let Some((name, txn)) = self.transactions.pop() {
            info!("Rolling back migration transaction for {}", name);
            if let Err(e) = txn.rollback().await {
                error!("Rollback failed on {}: {}", name, e);
                first_error
                    .get_or_insert(DbError::MigrationBatch(format!("rollback failed on {}: {}", name, e)));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

async fn rollback_all(transactions: Vec<(String, DatabaseTransaction)>) {
    for (name, txn) in transactions {
        if let Err(e) = txn.rollback().await {
            error!("Rollback failed on {}: {}", name, e);
        }
    }
}
