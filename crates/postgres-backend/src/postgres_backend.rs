// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use common::env_const::{get_check_connection_on_startup, get_connection_pool_size};
use procedure_core::{Backend, BackendConnection, BackendError, ConnectionTarget};
use restsql_env::{EnvError, Environment};
use restsql_pg::{DatabasePool, database_error::DatabaseError};
use tokio::sync::Mutex;
use tracing::debug;

use crate::connection::PostgresConnection;

/// Hands out pooled connections, with one pool per connection target created on first use.
pub struct PostgresBackend {
    pools: Mutex<HashMap<ConnectionTarget, Arc<DatabasePool>>>,
    pool_size: Option<usize>,
    check_connection: bool,
}

impl PostgresBackend {
    pub fn new(pool_size: Option<usize>, check_connection: bool) -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
            pool_size,
            check_connection,
        }
    }

    pub fn from_env(env: &dyn Environment) -> Result<Self, EnvError> {
        Ok(Self::new(
            get_connection_pool_size(env)?,
            get_check_connection_on_startup(env)?,
        ))
    }

    async fn pool(&self, target: &ConnectionTarget) -> Result<Arc<DatabasePool>, DatabaseError> {
        let mut pools = self.pools.lock().await;

        if let Some(pool) = pools.get(target) {
            return Ok(pool.clone());
        }

        debug!(%target, "Creating connection pool");
        let pool = Arc::new(
            DatabasePool::from_db_url(target.as_str(), self.pool_size, self.check_connection)
                .await?,
        );
        pools.insert(target.clone(), pool.clone());

        Ok(pool)
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    async fn connect(
        &self,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn BackendConnection>, BackendError> {
        let pool = self.pool(target).await.map_err(connection_error)?;
        let client = pool.get_client().await.map_err(connection_error)?;

        Ok(Box::new(PostgresConnection::new(client)))
    }
}

fn connection_error(error: DatabaseError) -> BackendError {
    BackendError::Connection(Box::new(error))
}

#[cfg(test)]
mod tests {
    use restsql_env::MapEnvironment;

    use super::*;

    #[test]
    fn settings_from_env() {
        let env = MapEnvironment::from([
            ("RESTSQL_CONNECTION_POOL_SIZE", "3"),
            ("RESTSQL_CHECK_CONNECTION_ON_STARTUP", "true"),
        ]);
        let backend = PostgresBackend::from_env(&env).unwrap();
        assert_eq!(backend.pool_size, Some(3));
        assert!(backend.check_connection);

        let env = MapEnvironment::from([("RESTSQL_CONNECTION_POOL_SIZE", "many")]);
        assert!(PostgresBackend::from_env(&env).is_err());
    }

    #[tokio::test]
    async fn invalid_targets_fail_to_connect() {
        let backend = PostgresBackend::new(None, false);
        let result = backend
            .connect(&ConnectionTarget::new("postgres://localhost/db?sslmode=bogus"))
            .await;
        assert!(matches!(result, Err(BackendError::Connection(_))));
    }
}
