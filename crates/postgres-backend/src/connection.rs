// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use async_trait::async_trait;
use procedure_core::{
    BackendConnection, BackendError, CallDescriptor, ExecutionKind, Table, Value,
};
use restsql_pg::DatabaseClient;
use tokio_postgres::types::ToSql;
use tracing::debug;

use crate::{
    statement::{CallStatement, output_columns},
    value_codec::{PgValue, decode},
};

/// A pooled client bound to one procedure invocation. Closing returns it to the pool.
pub(crate) struct PostgresConnection {
    client: Option<DatabaseClient>,
}

impl PostgresConnection {
    pub fn new(client: DatabaseClient) -> Self {
        Self {
            client: Some(client),
        }
    }
}

#[async_trait]
impl BackendConnection for PostgresConnection {
    async fn execute(
        &mut self,
        call: &mut CallDescriptor,
        kind: ExecutionKind,
    ) -> Result<Table, BackendError> {
        let client = match &self.client {
            Some(client) if !client.is_closed() => client,
            _ => return Err(BackendError::Closed),
        };

        let statement = CallStatement::new(call);
        debug!(sql = %statement.sql, "Executing routine");

        let prepared = client
            .prepare_cached(&statement.sql)
            .await
            .map_err(execution_error)?;

        let rows = {
            let values: Vec<PgValue> = statement
                .inputs
                .iter()
                .map(|&index| PgValue(&call.parameters[index].value))
                .collect();
            let params: Vec<&(dyn ToSql + Sync)> = values
                .iter()
                .map(|value| value as &(dyn ToSql + Sync))
                .collect();

            client
                .query(&prepared, &params)
                .await
                .map_err(execution_error)?
        };

        let columns: Vec<&str> = prepared.columns().iter().map(|c| c.name()).collect();
        let outputs = output_columns(call, &columns);

        for (parameter, column) in &outputs {
            let value = match (column, rows.first()) {
                (Some(column), Some(row)) => decode(row, *column)?,
                _ => Value::Null,
            };
            call.parameters[*parameter].value = value;
        }

        if kind == ExecutionKind::NonQuery {
            return Ok(Table::default());
        }

        // Output columns are not part of the result rows
        let result_columns: Vec<usize> = (0..columns.len())
            .filter(|index| !outputs.iter().any(|(_, column)| *column == Some(*index)))
            .collect();

        let mut table = Table::new(result_columns.iter().map(|&index| columns[index]));
        for row in &rows {
            let values = result_columns
                .iter()
                .map(|&index| decode(row, index))
                .collect::<Result<Vec<_>, _>>()?;
            table = table.with_row(values);
        }

        Ok(table)
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.client.take();
        Ok(())
    }
}

fn execution_error(error: tokio_postgres::Error) -> BackendError {
    if error.is_closed() {
        BackendError::Closed
    } else {
        BackendError::Execution(Box::new(error))
    }
}
