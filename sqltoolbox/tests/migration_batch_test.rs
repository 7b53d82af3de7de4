use std::collections::BTreeMap;
use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use sqltoolbox::engine::{create_engine, create_engines_for_names};
use sqltoolbox::{ConnectionSpec, DbError, EngineOptions, MigrationBatch};

fn sqlite_options() -> EngineOptions {
    let mut params = BTreeMap::new();
    params.insert("mode".to_owned(), "rwc".to_owned());
    EngineOptions { params, ..EngineOptions::default() }
}

async fn table_count(spec: &ConnectionSpec, name: &str, table: &str) -> i64 {
    let engine = create_engine(spec, Some(name), &sqlite_options()).await.unwrap();
    let row = engine
        .query_one(Statement::from_string(
            DatabaseBackend::Sqlite,
            format!("SELECT COUNT(*) AS cnt FROM sqlite_master WHERE type = 'table' AND name = '{}'", table),
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get::<i64>("", "cnt").unwrap()
}

#[tokio::test]
async fn test_batch_commit_applies_ddl_to_every_database() {
    let dir = tempfile::tempdir().unwrap();
    let spec = ConnectionSpec::lite("sqlite", "pysqlite", dir.path().join("primary.db").to_str().unwrap());
    let names: Vec<String> = ["batch_a.db", "batch_b.db"]
        .iter()
        .map(|n| dir.path().join(n).to_str().unwrap().to_owned())
        .collect();

    let engines = create_engines_for_names(&spec, &names, &sqlite_options()).await.unwrap();
    let batch = MigrationBatch::begin(engines).await.unwrap();
    for name in &names {
        batch
            .transaction(name)
            .unwrap()
            .execute(Statement::from_string(
                DatabaseBackend::Sqlite,
                "CREATE TABLE items (id INTEGER NOT NULL PRIMARY KEY)".to_owned(),
            ))
            .await
            .unwrap();
    }
    batch.commit().await.unwrap();

    for name in &names {
        assert_eq!(table_count(&spec, name, "items").await, 1);
    }
}

#[tokio::test]
async fn test_batch_rollback_leaves_no_database_touched() {
    let dir = tempfile::tempdir().unwrap();
    let spec = ConnectionSpec::lite("sqlite", "pysqlite", dir.path().join("primary.db").to_str().unwrap());
    let names: Vec<String> = ["batch_a.db", "batch_b.db"]
        .iter()
        .map(|n| dir.path().join(n).to_str().unwrap().to_owned())
        .collect();

    let engines = create_engines_for_names(&spec, &names, &sqlite_options()).await.unwrap();
    let batch = MigrationBatch::begin(engines).await.unwrap();
    for name in &names {
        batch
            .transaction(name)
            .unwrap()
            .execute(Statement::from_string(
                DatabaseBackend::Sqlite,
                "CREATE TABLE abandoned (id INTEGER NOT NULL PRIMARY KEY)".to_owned(),
            ))
            .await
            .unwrap();
    }
    batch.rollback().await.unwrap();

    for name in &names {
        assert_eq!(table_count(&spec, name, "abandoned").await, 0);
    }
}

#[tokio::test]
async fn test_batch_begin_failure_reports_batch_error_and_touches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let spec = ConnectionSpec::lite("sqlite", "pysqlite", dir.path().join("primary.db").to_str().unwrap());
    let good = dir.path().join("good.db").to_str().unwrap().to_owned();
    let missing = dir.path().join("absent").join("gone.db").to_str().unwrap().to_owned();

    let mut engines =
        create_engines_for_names(&spec, std::slice::from_ref(&good), &sqlite_options()).await.unwrap();
    // Read-only mode on a file that does not exist fails at first acquire,
    // which is the begin call.
    let mut ro_params = BTreeMap::new();
    ro_params.insert("mode".to_owned(), "ro".to_owned());
    let broken = create_engine(&spec, Some(&missing), &EngineOptions { params: ro_params, ..EngineOptions::default() })
        .await
        .unwrap();
    engines.insert(missing, Arc::new(broken));

    let err = MigrationBatch::begin(engines).await.unwrap_err();
    assert!(matches!(err, DbError::MigrationBatch(_)));
    assert_eq!(table_count(&spec, &good, "items").await, 0);
}

#[tokio::test]
async fn test_batch_commit_failure_rolls_back_remaining_databases() {
    let dir = tempfile::tempdir().unwrap();
    let spec = ConnectionSpec::lite("sqlite", "pysqlite", dir.path().join("primary.db").to_str().unwrap());
    let names: Vec<String> = ["batch_a.db", "batch_b.db"]
        .iter()
        .map(|n| dir.path().join(n).to_str().unwrap().to_owned())
        .collect();

    let engines = create_engines_for_names(&spec, &names, &sqlite_options()).await.unwrap();
    let batch = MigrationBatch::begin(engines).await.unwrap();
    for name in &names {
        let txn = batch.transaction(name).unwrap();
        // A deferred foreign key violation passes at statement time and
        // only surfaces when the transaction commits.
        for sql in [
            "PRAGMA defer_foreign_keys = ON",
            "CREATE TABLE parents (id INTEGER NOT NULL PRIMARY KEY)",
            "CREATE TABLE children (id INTEGER NOT NULL PRIMARY KEY, \
             parent_id INTEGER REFERENCES parents (id))",
            "INSERT INTO children (id, parent_id) VALUES (1, 99)",
        ] {
            txn.execute(Statement::from_string(DatabaseBackend::Sqlite, sql.to_owned())).await.unwrap();
        }
    }

    let err = batch.commit().await.unwrap_err();
    assert!(matches!(err, DbError::MigrationBatch(_)));
    for name in &names {
        assert_eq!(table_count(&spec, name, "parents").await, 0);
        assert_eq!(table_count(&spec, name, "children").await, 0);
    }
}

#[tokio::test]
async fn test_batch_exposes_every_named_transaction() {
    let dir = tempfile::tempdir().unwrap();
    let spec = ConnectionSpec::lite("sqlite", "pysqlite", dir.path().join("primary.db").to_str().unwrap());
    let names: Vec<String> = ["batch_a.db", "batch_b.db"]
        .iter()
        .map(|n| dir.path().join(n).to_str().unwrap().to_owned())
        .collect();

    let engines = create_engines_for_names(&spec, &names, &sqlite_options()).await.unwrap();
    let batch = MigrationBatch::begin(engines).await.unwrap();
    assert_eq!(batch.names().count(), 2);
    for name in &names {
        assert!(batch.transaction(name).is_some());
        assert!(batch.engine(name).is_some());
    }
    assert!(batch.transaction("unknown").is_none());
    batch.rollback().await.unwrap();
}
