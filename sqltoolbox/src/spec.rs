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

//! Connection specification module
//! Pure connection-string assembly for file-based and authenticated targets

use std::collections::BTreeMap;

use sea_orm::DatabaseBackend;

use crate::DbError;

/// Connection target description. Immutable once built; retargeting a sibling
/// database goes through the `*_for` methods instead of mutation.
///
/// The two variants carry the two supported credential shapes:
/// `Lite` for file-based databases and `Auth` for networked servers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSpec {
    /// File-based database, no credentials
    Lite {
        dialect: String,
        driver: String,
        name: String,
    },
    /// Networked database with user/password authentication
    Auth {
        dialect: String,
        driver: String,
        name: String,
        user: String,
        password: String,
        host: String,
        port: Option<u16>,
    },
}

impl ConnectionSpec {
    pub fn lite(dialect: impl Into<String>, driver: impl Into<String>, name: impl Into<String>) -> Self {
        ConnectionSpec::Lite {
            dialect: dialect.into(),
            driver: driver.into(),
            name: name.into(),
        }
    }

    /// Authenticated spec against `localhost` with the dialect's default port.
    /// Use [`ConnectionSpec::with_host`] and [`ConnectionSpec::with_port`] to retarget.
    pub fn auth(
        dialect: impl Into<String>,
        driver: impl Into<String>,
        name: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        ConnectionSpec::Auth {
            dialect: dialect.into(),
            driver: driver.into(),
            name: name.into(),
            user: user.into(),
            password: password.into(),
            host: "localhost".to_owned(),
            port: None,
        }
    }

    pub fn with_host(mut self, new_host: impl Into<String>) -> Self {
        if let ConnectionSpec::Auth { ref mut host, .. } = self {
            *host = new_host.into();
        }
        self
    }

    pub fn with_port(mut self, new_port: u16) -> Self {
        if let ConnectionSpec::Auth { ref mut port, .. } = self {
            *port = Some(new_port);
        }
        self
    }

    pub fn dialect(&self) -> &str {
        match self {
            ConnectionSpec::Lite { dialect, .. } | ConnectionSpec::Auth { dialect, .. } => dialect,
        }
    }

    pub fn driver(&self) -> &str {
        match self {
            ConnectionSpec::Lite { driver, .. } | ConnectionSpec::Auth { driver, .. } => driver,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ConnectionSpec::Lite { name, .. } | ConnectionSpec::Auth { name, .. } => name,
        }
    }

    /// Canonical connection string for the spec's own database name.
    pub fn connection_string(&self) -> String {
        self.connection_string_for(None)
    }

    /// Canonical connection string, optionally overriding the database name.
    ///
    /// Formats are fixed:
    /// - file-based: `{dialect}+{driver}:///{name}`
    /// - authenticated: `{dialect}+{driver}://{user}:{password}@{host}[:{port}]/{name}`
    pub fn connection_string_for(&self, target: Option<&str>) -> String {
        match self {
            ConnectionSpec::Lite { dialect, driver, name } => {
                format!("{}+{}:///{}", dialect, driver, target.unwrap_or(name))
            }
            ConnectionSpec::Auth { dialect, driver, name, user, password, host, port } => {
                let mut s = format!("{}+{}://{}:{}@{}", dialect, driver, user, password, host);
                if let Some(port) = port {
                    s.push_str(&format!(":{}", port));
                }
                format!("{}/{}", s, target.unwrap_or(name))
            }
        }
    }

    /// Canonical connection string per sibling database name, for migration
    /// runners operating in offline (string-only) mode.
    pub fn urls_for_names(&self, names: &[String]) -> BTreeMap<String, String> {
        names
            .iter()
            .map(|name| (name.clone(), self.connection_string_for(Some(name))))
            .collect()
    }

    /// Resolves the dialect to the driver layer's backend.
    pub fn backend(&self) -> Result<DatabaseBackend, DbError> {
        match self.dialect() {
            "sqlite" => Ok(DatabaseBackend::Sqlite),
            "mysql" | "mariadb" => Ok(DatabaseBackend::MySql),
            "postgres" | "postgresql" => Ok(DatabaseBackend::Postgres),
            other => Err(DbError::DriverResolution(other.to_owned())),
        }
    }

    /// URL in the form the sqlx driver layer accepts. The driver is baked
    /// into the backend scheme, so the `+{driver}` tag of the canonical
    /// string does not appear here; extra engine parameters become the
    /// query string, passed through verbatim.
    pub fn driver_url_for(
        &self,
        target: Option<&str>,
        params: &BTreeMap<String, String>,
    ) -> Result<String, DbError> {
        let scheme = match self.backend()? {
            DatabaseBackend::Sqlite => "sqlite",
            DatabaseBackend::MySql => "mysql",
            DatabaseBackend::Postgres => "postgres",
        };
        let mut url = match self {
            ConnectionSpec::Lite { name, .. } => {
                format!("{}://{}", scheme, target.unwrap_or(name))
            }
            ConnectionSpec::Auth { name, user, password, host, port, .. } => {
                let mut s = format!("{}://{}:{}@{}", scheme, user, password, host);
                if let Some(port) = port {
                    s.push_str(&format!(":{}", port));
                }
                format!("{}/{}", s, target.unwrap_or(name))
            }
        };
        if !params.is_empty() {
            let query: Vec<String> = params.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }
        Ok(url)
    }
}
