//! Engine factory module
//! Builds pooled sea-orm connections from a connection spec

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::spec::ConnectionSpec;
use crate::DbError;

/// Engine construction options shared by every engine built from one spec
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Verbose statement logging through the driver layer
    pub echo: bool,
    /// Maximum number of pooled connections
    pub max_connections: u32,
    /// Connection acquire timeout in seconds
    pub connect_timeout: u64,
    /// Extra driver parameters, appended verbatim to the driver URL
    pub params: BTreeMap<String, String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            echo: false,
            max_connections: 20,
            connect_timeout: 30,
            params: BTreeMap::new(),
        }
    }
}

/// Create a pooled engine for the spec's database, or for `target` when given.
///
/// Pool acquisition is lazy: an unreachable target does not fail here but on
/// the first real operation. Callers wanting fail-fast behavior follow up
/// with [`ping`].
pub async fn create_engine(
    spec: &ConnectionSpec,
    target: Option<&str>,
    options: &EngineOptions,
) -> Result<DatabaseConnection, DbError> {
    let url = spec.driver_url_for(target, &options.params)?;
    info!(
        "Creating engine for {} (max_connections={}, timeout={}s)",
        spec.connection_string_for(target),
        options.max_connections,
        options.connect_timeout
    );
    let mut opt = ConnectOptions::new(url);
    opt.max_connections(options.max_connections)
        .connect_timeout(Duration::from_secs(options.connect_timeout))
        .connect_lazy(true)
        .sqlx_logging(options.echo);
    Database::connect(opt).await.map_err(|e| DbError::Connection(e.to_string()))
}

/// Create one independent engine per database name, all sharing the spec's
/// credential set. No pool is shared between the returned engines.
pub async fn create_engines_for_names(
    spec: &ConnectionSpec,
    names: &[String],
    options: &EngineOptions,
) -> Result<HashMap<String, Arc<DatabaseConnection>>, DbError> {
    let mut engines = HashMap::with_capacity(names.len());
    for name in names {
        let engine = create_engine(spec, Some(name), options).await?;
        engines.insert(name.clone(), Arc::new(engine));
    }
    Ok(engines)
}

/// Explicit reachability check for callers that do not want the lazy deferral.
pub async fn ping(engine: &DatabaseConnection) -> Result<(), DbError> {
    engine.ping().await.map_err(|e| DbError::Connection(e.to_string()))
}
