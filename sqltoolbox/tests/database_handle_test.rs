use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use sea_orm::{ConnectionTrait, DatabaseBackend, MockDatabase, Statement};
use sqltoolbox::{
    ConnectionSpec, DatabaseHandle, DbError, DeclaredTables, EngineOptions, SchemaBinding,
    SchemaOrigin,
};

mod item {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "items")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        #[sea_orm(column_type = "String(StringLen::N(50))", nullable)]
        pub name: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

fn sqlite_spec(path: &Path) -> ConnectionSpec {
    ConnectionSpec::lite("sqlite", "pysqlite", path.to_str().unwrap())
}

fn sqlite_options() -> EngineOptions {
    let mut params = BTreeMap::new();
    params.insert("mode".to_owned(), "rwc".to_owned());
    EngineOptions { params, ..EngineOptions::default() }
}

async fn declared_handle(path: &Path) -> DatabaseHandle {
    let binding = SchemaBinding::declared(DeclaredTables::new().entity(item::Entity), true);
    DatabaseHandle::connect(sqlite_spec(path), binding, sqlite_options()).await.unwrap()
}

#[tokio::test]
async fn test_declared_binding_when_create_tables_then_items_exists() {
    let dir = tempfile::tempdir().unwrap();
    let handle = declared_handle(&dir.path().join("database.db")).await;

    let names = handle.get_table_names();
    assert_eq!(names.len(), 1);
    assert!(names.contains("items"));
    assert_eq!(handle.base().origin(), SchemaOrigin::Declared);
}

#[tokio::test]
async fn test_declared_binding_when_rebound_then_create_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("database.db");
    declared_handle(&path).await;
    // second bootstrap over the same file must be a no-op, not an error
    let handle = declared_handle(&path).await;
    assert!(handle.get_table_names().contains("items"));
}

#[tokio::test]
async fn test_reflected_binding_when_table_exists_then_snapshot_matches() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("database.db");
    let spec = sqlite_spec(&path);
    let options = sqlite_options();

    let engine = sqltoolbox::engine::create_engine(&spec, None, &options).await.unwrap();
    for sql in [
        "CREATE TABLE items (id INTEGER NOT NULL PRIMARY KEY, name VARCHAR(50))",
        "CREATE TABLE tags (id INTEGER NOT NULL PRIMARY KEY, \
         item_id INTEGER NOT NULL REFERENCES items (id))",
    ] {
        engine
            .execute(Statement::from_string(DatabaseBackend::Sqlite, sql.to_owned()))
            .await
            .unwrap();
    }
    drop(engine);

    let handle = DatabaseHandle::connect(spec, SchemaBinding::Reflected, options).await.unwrap();
    assert_eq!(handle.base().origin(), SchemaOrigin::Reflected);

    let names = handle.get_table_names();
    assert!(names.contains("items"));
    assert!(names.contains("tags"));

    let items = handle.base().table("items").unwrap();
    let id = items.columns.iter().find(|c| c.name == "id").unwrap();
    assert!(id.primary_key);
    assert!(!id.nullable);
    let name = items.columns.iter().find(|c| c.name == "name").unwrap();
    assert!(name.nullable);
    assert!(!name.primary_key);

    let tags = handle.base().table("tags").unwrap();
    assert_eq!(tags.foreign_keys.len(), 1);
    assert_eq!(tags.foreign_keys[0].column, "item_id");
    assert_eq!(tags.foreign_keys[0].referred_table, "items");
    assert_eq!(tags.foreign_keys[0].referred_column, "id");
}

#[tokio::test]
async fn test_reflected_binding_when_table_name_holds_quote_then_reflection_survives() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("database.db");
    let spec = sqlite_spec(&path);
    let options = sqlite_options();

    let engine = sqltoolbox::engine::create_engine(&spec, None, &options).await.unwrap();
    engine
        .execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            "CREATE TABLE \"odd\"\"name\" (id INTEGER NOT NULL PRIMARY KEY)".to_owned(),
        ))
        .await
        .unwrap();
    drop(engine);

    let handle = DatabaseHandle::connect(spec, SchemaBinding::Reflected, options).await.unwrap();
    let table = handle.base().table("odd\"name").unwrap();
    assert_eq!(table.columns.len(), 1);
    assert!(table.columns[0].primary_key);
}

#[tokio::test]
async fn test_session_when_committed_then_rows_persist() {
    let dir = tempfile::tempdir().unwrap();
    let handle = declared_handle(&dir.path().join("database.db")).await;

    handle
        .autocommit_session(|txn| {
            Box::pin(async move {
                txn.execute(Statement::from_string(
                    DatabaseBackend::Sqlite,
                    "INSERT INTO items (id, name) VALUES (1, 'first')".to_owned(),
                ))
                .await?;
                Ok(())
            })
        })
        .await
        .unwrap();

    let session = handle.session().await.unwrap();
    let row = session
        .query_one(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT COUNT(*) AS cnt FROM items".to_owned(),
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.try_get::<i64>("", "cnt").unwrap(), 1);
    session.commit().await.unwrap();
}

#[tokio::test]
async fn test_session_when_rolled_back_then_rows_vanish() {
    let dir = tempfile::tempdir().unwrap();
    let handle = declared_handle(&dir.path().join("database.db")).await;

    let session = handle.session().await.unwrap();
    session
        .execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            "INSERT INTO items (id, name) VALUES (1, 'first')".to_owned(),
        ))
        .await
        .unwrap();
    session.rollback().await.unwrap();

    let session = handle.session().await.unwrap();
    let row = session
        .query_one(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT COUNT(*) AS cnt FROM items".to_owned(),
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.try_get::<i64>("", "cnt").unwrap(), 0);
    session.commit().await.unwrap();
}

#[tokio::test]
async fn test_autocommit_session_when_callback_fails_then_rolled_back() {
    let dir = tempfile::tempdir().unwrap();
    let handle = declared_handle(&dir.path().join("database.db")).await;

    let result: Result<(), DbError> = handle
        .autocommit_session(|txn| {
            Box::pin(async move {
                txn.execute(Statement::from_string(
                    DatabaseBackend::Sqlite,
                    "INSERT INTO items (id, name) VALUES (1, 'first')".to_owned(),
                ))
                .await?;
                Err(sea_orm::DbErr::Custom("abort".to_owned()))
            })
        })
        .await;
    assert!(result.is_err());

    let session = handle.session().await.unwrap();
    let row = session
        .query_one(Statement::from_string(
            DatabaseBackend::Sqlite,
            "SELECT COUNT(*) AS cnt FROM items".to_owned(),
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.try_get::<i64>("", "cnt").unwrap(), 0);
    session.commit().await.unwrap();
}

#[tokio::test]
async fn test_engine_swap_when_backend_matches_then_connection_string_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path_a = dir.path().join("tenant_a.db");
    let path_b = dir.path().join("tenant_b.db");
    let mut handle = declared_handle(&path_a).await;
    let original = handle.connection_string();

    let sibling = handle.generate_engine(path_b.to_str()).await.unwrap();
    handle.set_engine(Arc::new(sibling)).unwrap();

    // the canonical string derives from the spec, not the attached engine
    assert_eq!(handle.connection_string(), original);
    assert!(handle.get_table_names().contains("items"));
}

#[tokio::test]
async fn test_engine_swap_when_backend_differs_then_mismatch_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut handle = declared_handle(&dir.path().join("database.db")).await;

    let foreign = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let result = handle.set_engine(Arc::new(foreign));
    assert!(matches!(result, Err(DbError::EngineMismatch { .. })));
}

#[tokio::test]
async fn test_database_names_on_sqlite_lists_main() {
    let dir = tempfile::tempdir().unwrap();
    let handle = declared_handle(&dir.path().join("database.db")).await;

    let names = handle.get_database_names(None, None).await.unwrap();
    assert!(names.iter().any(|n| n == "main"));
}

#[tokio::test]
async fn test_ping_on_live_sqlite_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let handle = declared_handle(&dir.path().join("database.db")).await;
    handle.ping().await.unwrap();
}

#[tokio::test]
async fn test_get_engines_from_list_opens_one_engine_per_name() {
    let dir = tempfile::tempdir().unwrap();
    let handle = declared_handle(&dir.path().join("database.db")).await;

    let names: Vec<String> = ["sibling_a.db", "sibling_b.db"]
        .iter()
        .map(|n| dir.path().join(n).to_str().unwrap().to_owned())
        .collect();
    let engines = handle.get_engines_from_list(&names).await.unwrap();
    assert_eq!(engines.len(), 2);
    for name in &names {
        engines[name].ping().await.unwrap();
    }
}
