// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::str::FromStr;

use deadpool_postgres::{
    ConfigConnectImpl, Connect, Manager, ManagerConfig, Pool, RecyclingMethod,
};
use tokio_postgres::Config;

use crate::database_error::DatabaseError;

use super::{database_client::DatabaseClient, ssl_config::SslConfig};

pub const DEFAULT_POOL_SIZE: usize = 10;

pub struct DatabasePool {
    pool: Pool,
}

impl DatabasePool {
    pub async fn from_db_url(
        url: &str,
        pool_size: Option<usize>,
        check_connection: bool,
    ) -> Result<Self, DatabaseError> {
        let (url, ssl_config) = SslConfig::from_url(url)?;

        let config = Config::from_str(&url).map_err(|e| {
            DatabaseError::Delegate(e)
                .with_context("Failed to parse PostgreSQL connection string".into())
        })?;

        // Only if there is any TCP host, use the TLS connector (SSL over unix sockets errors out)
        let has_tcp_hosts = config
            .get_hosts()
            .iter()
            .any(|host| matches!(host, tokio_postgres::config::Host::Tcp(_)));

        let pool_size = pool_size.unwrap_or(DEFAULT_POOL_SIZE);

        let pool = match ssl_config {
            Some(ssl_config) if has_tcp_hosts => {
                let (config, tls) = ssl_config.updated_config(config)?;
                Self::from_connect(pool_size, config, ConfigConnectImpl { tls })?
            }
            _ => {
                let tls = tokio_postgres::NoTls;
                Self::from_connect(pool_size, config, ConfigConnectImpl { tls })?
            }
        };

        if check_connection {
            let client = pool.get_client().await?;
            drop(client);
        }

        Ok(pool)
    }

    fn from_connect(
        pool_size: usize,
        config: Config,
        connect: impl Connect + 'static,
    ) -> Result<Self, DatabaseError> {
        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = Manager::from_connect(config, connect, manager_config);

        let pool = Pool::builder(manager)
            .max_size(pool_size)
            .build()
            .map_err(|e| DatabaseError::Config(format!("Failed to create DB pool: {e}")))?;

        Ok(Self { pool })
    }

    pub async fn get_client(&self) -> Result<DatabaseClient, DatabaseError> {
        Ok(DatabaseClient::new(self.pool.get().await?))
    }
}
