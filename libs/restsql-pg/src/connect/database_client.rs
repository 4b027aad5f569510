// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use tokio_postgres::{Row, Statement, ToStatement, types::ToSql};

/// A client checked out of a [`super::database_pool::DatabasePool`]. Dropping it returns the
/// underlying connection to the pool.
pub struct DatabaseClient {
    client: deadpool_postgres::Client,
}

impl DatabaseClient {
    pub(crate) fn new(client: deadpool_postgres::Client) -> Self {
        Self { client }
    }

    pub async fn query<T>(
        &self,
        query: &T,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, tokio_postgres::Error>
    where
        T: ?Sized + ToStatement,
    {
        self.client.query(query, params).await
    }

    /// Prepares `query`, reusing the statement if this connection prepared it before.
    pub async fn prepare_cached(&self, query: &str) -> Result<Statement, tokio_postgres::Error> {
        self.client.prepare_cached(query).await
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}
