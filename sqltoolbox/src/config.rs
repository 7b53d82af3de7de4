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

//! Database configuration module
//! Loads connection settings from environment variables or an env-file

use std::env;

use log::info;

use crate::engine::EngineOptions;
use crate::spec::ConnectionSpec;
use crate::DbError;

/// Connection settings as loaded from the environment
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQL dialect ("sqlite", "mysql", "postgres")
    pub dialect: String,
    /// Client library protocol tag, kept in the canonical connection string
    pub driver: String,
    /// Database name or file path
    pub name: String,
    /// Credential pair; both unset for file-based databases
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection timeout (seconds)
    pub timeout: u64,
    /// Verbose statement logging
    pub echo: bool,
}

impl DbConfig {
    /// Loads connection settings from the environment, reading a `.env` file
    /// first when one is present.
    ///
    /// `DIALECT`, `DRIVER` and `NAME` are required; `USER` and `PASSWORD`
    /// select the authenticated variant and must be set together. `DB_HOST`
    /// defaults to "localhost", `DB_PORT` to the dialect's default port.
    /// `DATABASE_MAX_CONNECTIONS` and `DATABASE_TIMEOUT` fall back to 20 and
    /// 30 seconds, `DATABASE_ECHO` to off.
    ///
    /// # Errors
    ///
    /// * `DbError::Configuration` - a required variable is missing or a
    ///   value cannot be parsed. Raised before any I/O.
    pub fn from_env() -> Result<Self, DbError> {
        info!("Loading database configuration from environment");
        dotenv::dotenv().ok();

        let dialect = require("DIALECT")?;
        let driver = require("DRIVER")?;
        let name = require("NAME")?;

        let user = env::var("USER").ok();
        let password = env::var("PASSWORD").ok();
        if user.is_some() != password.is_some() {
            return Err(DbError::Configuration(
                "USER and PASSWORD must be set together".to_owned(),
            ));
        }

        let host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_owned());
        let port = match env::var("DB_PORT") {
            Ok(value) => Some(
                value
                    .parse::<u16>()
                    .map_err(|_| DbError::Configuration(format!("DB_PORT is not a valid port: {}", value)))?,
            ),
            Err(_) => None,
        };

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(20);
        let timeout = env::var("DATABASE_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);
        let echo = env::var("DATABASE_ECHO")
            .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self { dialect, driver, name, user, password, host, port, max_connections, timeout, echo })
    }

    /// Connection spec for these settings: authenticated when a credential
    /// pair is present, file-based otherwise.
    pub fn to_spec(&self) -> ConnectionSpec {
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => {
                let mut spec = ConnectionSpec::auth(
                    self.dialect.clone(),
                    self.driver.clone(),
                    self.name.clone(),
                    user.clone(),
                    password.clone(),
                )
                .with_host(self.host.clone());
                if let Some(port) = self.port {
                    spec = spec.with_port(port);
                }
                spec
            }
            _ => ConnectionSpec::lite(self.dialect.clone(), self.driver.clone(), self.name.clone()),
        }
    }

    /// Engine options carrying the pool settings loaded from the environment.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            echo: self.echo,
            max_connections: self.max_connections,
            connect_timeout: self.timeout,
            ..EngineOptions::default()
        }
    }
}

fn require(key: &str) -> Result<String, DbError> {
    env::var(key).map_err(|_| DbError::Configuration(format!("{} must be set", key)))
}
