// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The boundary to the relational driver.
//!
//! A [`Backend`] opens one [`BackendConnection`] per invocation. The connection runs a
//! [`CallDescriptor`] (the routine plus its typed, directed parameters), returns the result rows
//! and writes output values back into the descriptor's parameters.

use std::fmt::{Debug, Display};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::{procedure::RoutineType, value::Value};

/// Backend storage type of a parameter, with the size details the driver needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageType {
    BigInt,
    Int,
    SmallInt,
    TinyInt,
    Bit,
    Char { size: Option<u32> },
    VarChar { size: Option<u32> },
    NChar { size: Option<u32> },
    NVarChar { size: Option<u32> },
    SmallDateTime,
    Date,
    DateTime,
    DateTime2 { scale: u8 },
    Time { scale: u8 },
    DateTimeOffset { scale: u8 },
    Decimal { precision: u8, scale: u8 },
    UniqueIdentifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    /// Sent to the routine and read back after execution.
    Output,
    ReturnValue,
}

impl Direction {
    pub fn is_input(&self) -> bool {
        matches!(self, Direction::Input | Direction::Output)
    }

    pub fn is_output(&self) -> bool {
        matches!(self, Direction::Output | Direction::ReturnValue)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    pub name: String,
    pub storage: StorageType,
    pub direction: Direction,
    pub value: Value,
}

/// A stored-routine invocation: the routine address and its parameters in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct CallDescriptor {
    pub schema: String,
    pub name: String,
    pub routine_type: RoutineType,
    pub parameters: Vec<BoundParameter>,
}

impl CallDescriptor {
    /// `[schema].[name]`
    pub fn command_text(&self) -> String {
        format!("[{}].[{}]", self.schema, self.name)
    }

    pub fn parameter(&self, name: &str) -> Option<&BoundParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut BoundParameter> {
        self.parameters.iter_mut().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionKind {
    /// Result rows are returned.
    Reader,
    /// Result rows are discarded; only output parameters matter.
    NonQuery,
}

/// Rows returned by a routine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: vec![],
        }
    }

    pub fn with_row(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let column = self.column_index(column)?;
        self.rows.get(row)?.get(column)
    }

    /// Builds a table from a JSON document: an array of objects gives one row per object, a single
    /// object gives one row, and an empty document gives an empty table. Columns are the union of
    /// the keys in first-seen order.
    pub fn from_json_text(json: &str) -> Result<Table, BackendError> {
        if json.trim().is_empty() {
            return Ok(Table::default());
        }

        let document: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| BackendError::Decode(format!("Invalid JSON result: {e}")))?;

        let objects = match document {
            serde_json::Value::Array(elements) => elements,
            serde_json::Value::Null => vec![],
            object @ serde_json::Value::Object(_) => vec![object],
            other => {
                return Err(BackendError::Decode(format!(
                    "Expected a JSON object or array, got {other}"
                )));
            }
        };

        let mut table = Table::default();
        let mut records = Vec::with_capacity(objects.len());

        for object in objects {
            let serde_json::Value::Object(fields) = object else {
                return Err(BackendError::Decode(
                    "Expected an array of JSON objects".to_string(),
                ));
            };
            for key in fields.keys() {
                if table.column_index(key).is_none() {
                    table.columns.push(key.clone());
                }
            }
            records.push(fields);
        }

        for mut fields in records {
            // Nested documents are kept as their JSON text.
            let row = table
                .columns
                .iter()
                .map(|column| match fields.remove(column) {
                    Some(value) => Value::from_json(value.clone())
                        .unwrap_or_else(|_| Value::Text(value.to_string())),
                    None => Value::Null,
                })
                .collect();
            table.rows.push(row);
        }

        Ok(table)
    }
}

/// Where a procedure's connection goes, e.g. a PostgreSQL URL.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ConnectionTarget(String);

impl ConnectionTarget {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The same target with transport encryption required.
    pub fn with_encrypted_transport(&self) -> Self {
        let separator = if self.0.contains('?') { '&' } else { '?' };
        Self(format!("{}{separator}sslmode=require", self.0))
    }
}

impl Display for ConnectionTarget {
    /// Credentials (anything between the scheme and `@`) are masked.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.0.find("://"), self.0.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                write!(f, "{}://***{}", &self.0[..scheme_end], &self.0[at..])
            }
            _ => write!(f, "{}", self.0),
        }
    }
}

impl Debug for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ConnectionTarget({self})")
    }
}

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    Connection(#[source] BoxedError),

    #[error("{0}")]
    Execution(#[source] BoxedError),

    #[error("{0}")]
    Decode(String),

    #[error("Connection is closed")]
    Closed,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn connect(
        &self,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn BackendConnection>, BackendError>;
}

#[async_trait]
pub trait BackendConnection: Send + Sync {
    /// Runs the call. Values of `Output` and `ReturnValue` parameters are written back into
    /// `call`; parameters the routine didn't report are set to `Null`.
    async fn execute(
        &mut self,
        call: &mut CallDescriptor,
        kind: ExecutionKind,
    ) -> Result<Table, BackendError>;

    async fn close(&mut self) -> Result<(), BackendError>;
}
