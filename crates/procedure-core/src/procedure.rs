// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{collections::HashSet, fmt::Debug};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    backend::{
        Backend, BackendConnection, BackendError, CallDescriptor, ConnectionTarget, ExecutionKind,
        Table,
    },
    error::ProcedureError,
    parameter::{Parameter, RETURN_VALUE},
    value::{FromValue, Value},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoutineType {
    Procedure,
    Function,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum State {
    #[default]
    Uninitialized,
    Initialized,
    Disposed,
}

/// The call descriptor and the connection it runs on. Owned by exactly one procedure instance.
struct BoundCommand {
    call: CallDescriptor,
    connection: Option<Box<dyn BackendConnection>>,
}

impl Debug for BoundCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundCommand")
            .field("call", &self.call)
            .field("connected", &self.connection.is_some())
            .finish()
    }
}

/// Addresses a parameter by name (`@WIDGET_ID` or `WIDGET_ID`) or by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterRef {
    Name(String),
    Position(usize),
}

impl From<&str> for ParameterRef {
    fn from(name: &str) -> Self {
        ParameterRef::Name(name.to_string())
    }
}

impl From<String> for ParameterRef {
    fn from(name: String) -> Self {
        ParameterRef::Name(name)
    }
}

impl From<usize> for ParameterRef {
    fn from(position: usize) -> Self {
        ParameterRef::Position(position)
    }
}

/// A stored routine and, once initialized, the resources to invoke it.
///
/// Instances in the catalog are templates: they are never initialized. Every invocation works on
/// its own copy made by [`Procedure::instantiate`], which goes through
/// `initialize -> (execute)* -> dispose`. Executions re-validate every input parameter before
/// anything is sent to the backend.
///
/// For a `PROCEDURE`, position 0 always holds the `@RETURN_VALUE` status parameter once
/// initialized.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Procedure {
    specific_schema: String,
    specific_name: String,
    routine_type: RoutineType,
    #[serde(default)]
    is_json_result: bool,
    #[serde(default)]
    is_single_result: bool,
    #[serde(default)]
    is_always_encrypted: bool,
    #[serde(default)]
    is_non_query: bool,
    #[serde(default)]
    parameters: Vec<Parameter>,

    #[serde(skip)]
    connection_target: Option<ConnectionTarget>,
    #[serde(skip)]
    state: State,
    #[serde(skip)]
    command: Option<BoundCommand>,
}

impl Procedure {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        routine_type: RoutineType,
    ) -> Self {
        Self {
            specific_schema: schema.into(),
            specific_name: name.into(),
            routine_type,
            is_json_result: false,
            is_single_result: false,
            is_always_encrypted: false,
            is_non_query: false,
            parameters: vec![],
            connection_target: None,
            state: State::Uninitialized,
            command: None,
        }
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_json_result(mut self, json_result: bool) -> Self {
        self.is_json_result = json_result;
        self
    }

    pub fn with_single_result(mut self, single_result: bool) -> Self {
        self.is_single_result = single_result;
        self
    }

    pub fn with_always_encrypted(mut self, always_encrypted: bool) -> Self {
        self.is_always_encrypted = always_encrypted;
        self
    }

    pub fn with_non_query(mut self, non_query: bool) -> Self {
        self.is_non_query = non_query;
        self
    }

    pub fn with_connection_target(mut self, target: ConnectionTarget) -> Self {
        self.connection_target = Some(target);
        self
    }

    /// Readies a catalog entry: orders parameters by position, compiles their patterns and binds
    /// the connection target.
    pub(crate) fn prepare(&mut self, target: ConnectionTarget) -> Result<(), ProcedureError> {
        let key = self.key();
        self.parameters.sort_by_key(|p| p.ordinal_position());

        let mut names = HashSet::new();
        for parameter in &mut self.parameters {
            parameter.compile_pattern()?;
            if !parameter.name().is_empty() && !names.insert(parameter.name().to_uppercase()) {
                return Err(ProcedureError::CatalogLoad(format!(
                    "Duplicate parameter {} in {key}",
                    parameter.name()
                )));
            }
        }

        self.connection_target = Some(target);
        Ok(())
    }

    /// A fresh, uninitialized copy: same metadata and target, no values, no resources.
    pub fn instantiate(&self) -> Procedure {
        Procedure {
            specific_schema: self.specific_schema.clone(),
            specific_name: self.specific_name.clone(),
            routine_type: self.routine_type,
            is_json_result: self.is_json_result,
            is_single_result: self.is_single_result,
            is_always_encrypted: self.is_always_encrypted,
            is_non_query: self.is_non_query,
            parameters: self.parameters.iter().map(Parameter::detached).collect(),
            connection_target: self.connection_target.clone(),
            state: State::Uninitialized,
            command: None,
        }
    }

    pub fn schema(&self) -> &str {
        &self.specific_schema
    }

    pub fn name(&self) -> &str {
        &self.specific_name
    }

    /// `[schema].[name]`
    pub fn key(&self) -> String {
        format!("[{}].[{}]", self.specific_schema, self.specific_name)
    }

    pub fn routine_type(&self) -> RoutineType {
        self.routine_type
    }

    pub fn produces_json(&self) -> bool {
        self.is_json_result
    }

    pub fn is_single_result(&self) -> bool {
        self.is_single_result
    }

    pub fn requires_encrypted_transport(&self) -> bool {
        self.is_always_encrypted
    }

    pub fn is_non_query(&self) -> bool {
        self.is_non_query
    }

    pub fn connection_target(&self) -> Option<&ConnectionTarget> {
        self.connection_target.as_ref()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn is_initialized(&self) -> bool {
        self.state == State::Initialized
    }

    pub fn is_disposed(&self) -> bool {
        self.state == State::Disposed
    }

    /// Builds the call descriptor and opens a connection for it.
    pub async fn initialize(&mut self, backend: &dyn Backend) -> Result<(), ProcedureError> {
        match self.state {
            State::Uninitialized => {}
            State::Initialized => {
                return Err(ProcedureError::InvalidState(format!(
                    "Procedure {} is already initialized",
                    self.key()
                )));
            }
            State::Disposed => return Err(ProcedureError::UseAfterDispose(self.key())),
        }

        let has_return_value = self
            .parameters
            .first()
            .is_some_and(|p| p.is_result() && p.name() == RETURN_VALUE);
        if self.routine_type == RoutineType::Procedure && !has_return_value {
            self.parameters.insert(0, Parameter::return_value());
        }

        let call = CallDescriptor {
            schema: self.specific_schema.clone(),
            name: self.specific_name.clone(),
            routine_type: self.routine_type,
            parameters: self
                .parameters
                .iter()
                .map(Parameter::to_backend_parameter)
                .collect::<Result<_, _>>()?,
        };

        let target = self
            .connection_target
            .as_ref()
            .ok_or_else(|| ProcedureError::MissingConnectionTarget(self.key()))?;

        debug!(procedure = %self.key(), %target, "Opening connection");
        let connection = backend
            .connect(target)
            .await
            .map_err(ProcedureError::BackendUnavailable)?;

        self.command = Some(BoundCommand {
            call,
            connection: Some(connection),
        });
        self.state = State::Initialized;

        Ok(())
    }

    /// Checks every input parameter's bound value.
    pub fn validate(&self) -> Result<(), ProcedureError> {
        self.ensure_not_disposed()?;

        self.parameters
            .iter()
            .filter(|p| p.accepts_input())
            .try_for_each(Parameter::validate_bound)
    }

    /// Runs a JSON-producing routine and returns the concatenated JSON text.
    pub async fn execute_json(&mut self) -> Result<String, ProcedureError> {
        self.ensure_not_disposed()?;
        if !self.is_json_result {
            return Err(ProcedureError::InvalidResultMode(self.key()));
        }

        let table = self.execute(ExecutionKind::Reader).await?;
        json_text(&table)
    }

    /// Runs the routine and returns its rows. The JSON text of a JSON-producing routine is
    /// reshaped into rows.
    pub async fn execute_tabular(&mut self) -> Result<Table, ProcedureError> {
        if self.is_json_result {
            let json = self.execute_json().await?;
            Table::from_json_text(&json).map_err(ProcedureError::ExecutionFailed)
        } else {
            self.execute(ExecutionKind::Reader).await
        }
    }

    pub async fn execute_non_query(&mut self) -> Result<(), ProcedureError> {
        self.execute(ExecutionKind::NonQuery).await.map(|_| ())
    }

    async fn execute(&mut self, kind: ExecutionKind) -> Result<Table, ProcedureError> {
        match self.state {
            State::Initialized => {}
            State::Uninitialized => {
                return Err(ProcedureError::InvalidState(format!(
                    "Procedure {} is not initialized",
                    self.key()
                )));
            }
            State::Disposed => return Err(ProcedureError::UseAfterDispose(self.key())),
        }

        self.validate()?;

        let key = self.key();
        let Some(BoundCommand {
            call,
            connection: Some(connection),
        }) = self.command.as_mut()
        else {
            return Err(ProcedureError::InvalidState(format!(
                "Procedure {key} has no open connection"
            )));
        };

        for (parameter, bound) in self.parameters.iter().zip(call.parameters.iter_mut()) {
            bound.value = if parameter.accepts_input() {
                parameter.raw_value().clone()
            } else {
                Value::Null
            };
        }

        debug!(procedure = %key, ?kind, "Executing");
        let table = connection.execute(call, kind).await?;

        for (parameter, bound) in self.parameters.iter_mut().zip(call.parameters.iter()) {
            if parameter.returns_output() {
                parameter.store_output(bound.value.clone());
            }
        }

        Ok(table)
    }

    fn ensure_not_disposed(&self) -> Result<(), ProcedureError> {
        if self.state == State::Disposed {
            Err(ProcedureError::UseAfterDispose(self.key()))
        } else {
            Ok(())
        }
    }

    fn position(&self, reference: &ParameterRef) -> Result<usize, ProcedureError> {
        self.ensure_not_disposed()?;

        match reference {
            ParameterRef::Position(position) if *position < self.parameters.len() => Ok(*position),
            ParameterRef::Position(position) => Err(ProcedureError::ParameterNotFound(format!(
                "at position {position}"
            ))),
            ParameterRef::Name(name) => {
                let name = if name.starts_with('@') {
                    name.clone()
                } else {
                    format!("@{name}")
                };
                self.parameters
                    .iter()
                    .position(|p| p.name() == name)
                    .ok_or(ProcedureError::ParameterNotFound(name))
            }
        }
    }

    pub fn parameter(
        &self,
        reference: impl Into<ParameterRef>,
    ) -> Result<&Parameter, ProcedureError> {
        let position = self.position(&reference.into())?;
        Ok(&self.parameters[position])
    }

    pub fn value<T: FromValue>(
        &self,
        reference: impl Into<ParameterRef>,
    ) -> Result<Option<T>, ProcedureError> {
        self.parameter(reference)?.value()
    }

    /// The value of the parameter at position 0.
    pub fn return_value<T: FromValue>(&self) -> Result<Option<T>, ProcedureError> {
        self.value(0)
    }

    pub fn set_value(
        &mut self,
        reference: impl Into<ParameterRef>,
        value: impl Into<Value>,
    ) -> Result<(), ProcedureError> {
        let position = self.position(&reference.into())?;
        self.parameters[position].set_value(value)
    }

    pub fn set_untyped(
        &mut self,
        reference: impl Into<ParameterRef>,
        value: impl Into<Value>,
    ) -> Result<(), ProcedureError> {
        let position = self.position(&reference.into())?;
        self.parameters[position].set_untyped(value)
    }

    /// Closes the connection and releases the call descriptor. Later calls are no-ops; close
    /// failures are logged.
    pub async fn dispose(&mut self) {
        if self.state == State::Disposed {
            return;
        }
        self.state = State::Disposed;

        if let Some(mut command) = self.command.take() {
            if let Some(mut connection) = command.connection.take() {
                if let Err(e) = connection.close().await {
                    warn!(procedure = %self.key(), "Failed to close connection: {e}");
                }
            }
        }
    }
}

impl Drop for Procedure {
    fn drop(&mut self) {
        if self
            .command
            .as_ref()
            .is_some_and(|command| command.connection.is_some())
        {
            warn!(procedure = %self.key(), "Procedure dropped without being disposed");
        }
    }
}

/// Concatenates the first column of every row. Rows with a null column contribute nothing.
fn json_text(table: &Table) -> Result<String, ProcedureError> {
    let mut json = String::new();

    for row in &table.rows {
        match row.first() {
            Some(Value::Text(chunk)) => json.push_str(chunk),
            Some(Value::Null) | None => {}
            Some(other) => {
                return Err(ProcedureError::ExecutionFailed(BackendError::Decode(
                    format!("Expected a text column in a JSON result, got {}", other.kind()),
                )));
            }
        }
    }

    Ok(json)
}

#[cfg(test)]
mod tests {
    use crate::{
        backend::Direction,
        data_type::DataType,
        parameter::ParameterMode,
        testing::{MockBackend, json_rows},
    };

    use super::*;

    const TARGET: &str = "postgres://localhost/open";

    fn get_widgets() -> Procedure {
        Procedure::new("open", "GET_widgets", RoutineType::Procedure)
            .with_json_result(true)
            .with_parameter(
                Parameter::new("@WIDGET_ID", DataType::Int, ParameterMode::In)
                    .with_ordinal_position(1)
                    .with_nullable(false),
            )
            .with_connection_target(ConnectionTarget::new(TARGET))
    }

    fn widgets_backend() -> MockBackend {
        let backend = MockBackend::new();
        backend.on_routine("[open].[GET_widgets]", |call| {
            let id = match &call.parameter("@WIDGET_ID").unwrap().value {
                Value::Int(id) => *id,
                other => panic!("unexpected widget id {other:?}"),
            };
            call.parameter_mut(RETURN_VALUE).unwrap().value = Value::Int(200);
            Ok(json_rows(&format!(r#"{{"id":{id},"name":"Bolt"}}"#), 8))
        });
        backend
    }

    #[tokio::test]
    async fn initialize_prepends_return_value() {
        let backend = widgets_backend();
        let mut procedure = get_widgets().instantiate();
        procedure.initialize(&backend).await.unwrap();

        let names: Vec<_> = procedure.parameters().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec![RETURN_VALUE, "@WIDGET_ID"]);
        assert!(procedure.parameters()[0].is_result());

        let Some(command) = &procedure.command else {
            panic!("expected a bound command");
        };
        assert_eq!(command.call.command_text(), "[open].[GET_widgets]");
        assert_eq!(
            command.call.parameters[0].direction,
            Direction::ReturnValue
        );
        assert_eq!(command.call.parameters[1].direction, Direction::Input);

        assert!(matches!(
            procedure.initialize(&backend).await,
            Err(ProcedureError::InvalidState(_))
        ));

        procedure.dispose().await;
    }

    #[tokio::test]
    async fn return_value_is_not_duplicated() {
        let backend = widgets_backend();
        let mut procedure = Procedure::new("open", "GET_widgets", RoutineType::Procedure)
            .with_parameter(Parameter::return_value())
            .with_connection_target(ConnectionTarget::new(TARGET));
        procedure.initialize(&backend).await.unwrap();

        assert_eq!(procedure.parameters().len(), 1);
        procedure.dispose().await;
    }

    #[tokio::test]
    async fn functions_have_no_implicit_return_value() {
        let backend = widgets_backend();
        let mut function = Procedure::new("open", "widget_count", RoutineType::Function)
            .with_connection_target(ConnectionTarget::new(TARGET));
        function.initialize(&backend).await.unwrap();

        assert!(function.parameters().is_empty());
        function.dispose().await;
    }

    #[tokio::test]
    async fn execute_json() {
        let backend = widgets_backend();
        let mut procedure = get_widgets().instantiate();
        procedure.initialize(&backend).await.unwrap();
        // Wire names are converted by the REST layer, not here
        assert!(matches!(
            procedure.set_untyped("widgetId", "42"),
            Err(ProcedureError::ParameterNotFound(_))
        ));
        procedure.set_untyped("WIDGET_ID", "42").unwrap();

        let json = procedure.execute_json().await.unwrap();
        assert_eq!(json, r#"{"id":42,"name":"Bolt"}"#);
        assert_eq!(procedure.return_value::<i32>().unwrap(), Some(200));
        // Inputs are not overwritten by the read-back
        assert_eq!(procedure.value::<i64>("@WIDGET_ID").unwrap(), Some(42));

        procedure.dispose().await;
    }

    #[tokio::test]
    async fn validation_happens_before_the_backend_call() {
        let backend = widgets_backend();
        let mut procedure = get_widgets().instantiate();
        procedure.initialize(&backend).await.unwrap();

        assert!(matches!(
            procedure.execute_json().await,
            Err(ProcedureError::RequiredValueMissing { .. })
        ));
        assert_eq!(backend.stats().executions(), 0);

        procedure.dispose().await;
    }

    #[tokio::test]
    async fn json_requires_a_json_routine() {
        let backend = widgets_backend();
        let mut procedure = get_widgets().with_json_result(false).instantiate();
        procedure.initialize(&backend).await.unwrap();
        procedure.set_value("@WIDGET_ID", 1).unwrap();

        assert!(matches!(
            procedure.execute_json().await,
            Err(ProcedureError::InvalidResultMode(_))
        ));
        assert_eq!(backend.stats().executions(), 0);

        procedure.dispose().await;
    }

    #[tokio::test]
    async fn tabular_results() {
        let backend = widgets_backend();
        backend.on_routine("[open].[list_widgets]", |_| {
            Ok(Table::new(["id", "name"])
                .with_row(vec![Value::Int(1), Value::from("Bolt")])
                .with_row(vec![Value::Int(2), Value::from("Nut")]))
        });

        let mut json_procedure = get_widgets().instantiate();
        json_procedure.initialize(&backend).await.unwrap();
        json_procedure.set_value("@WIDGET_ID", 7).unwrap();
        let table = json_procedure.execute_tabular().await.unwrap();
        assert_eq!(table.columns, vec!["id", "name"]);
        assert_eq!(table.get(0, "id"), Some(&Value::Int(7)));
        json_procedure.dispose().await;

        let mut rows_procedure = Procedure::new("open", "list_widgets", RoutineType::Function)
            .with_connection_target(ConnectionTarget::new(TARGET));
        rows_procedure.initialize(&backend).await.unwrap();
        let table = rows_procedure.execute_tabular().await.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1, "name"), Some(&Value::from("Nut")));
        rows_procedure.dispose().await;
    }

    #[tokio::test]
    async fn outputs_are_read_back() {
        let backend = MockBackend::new();
        backend.on_routine("[open].[reserve_widget]", |call| {
            let quantity = match call.parameter("@QUANTITY").unwrap().value {
                Value::Int(q) => q,
                _ => 0,
            };
            call.parameter_mut("@QUANTITY").unwrap().value = Value::Int(quantity - 1);
            call.parameter_mut("@RESERVATION").unwrap().value = Value::from("R-1");
            call.parameter_mut(RETURN_VALUE).unwrap().value = Value::Int(201);
            Ok(Table::new(["ignored"]).with_row(vec![Value::Int(1)]))
        });

        let mut procedure = Procedure::new("open", "reserve_widget", RoutineType::Procedure)
            .with_non_query(true)
            .with_parameter(Parameter::new(
                "@QUANTITY",
                DataType::Int,
                ParameterMode::InOut,
            ))
            .with_parameter(Parameter::new(
                "@RESERVATION",
                DataType::VarChar,
                ParameterMode::Out,
            ))
            .with_connection_target(ConnectionTarget::new(TARGET));
        procedure.initialize(&backend).await.unwrap();
        procedure.set_value("QUANTITY", 5).unwrap();
        procedure.execute_non_query().await.unwrap();

        assert_eq!(procedure.value::<i32>("@QUANTITY").unwrap(), Some(4));
        assert_eq!(
            procedure.value::<String>(2).unwrap(),
            Some("R-1".to_string())
        );
        assert_eq!(procedure.return_value::<i32>().unwrap(), Some(201));
        assert!(matches!(
            procedure.value::<i32>(3),
            Err(ProcedureError::ParameterNotFound(_))
        ));
        assert!(matches!(
            procedure.value::<i32>("@COLOR"),
            Err(ProcedureError::ParameterNotFound(_))
        ));
        // Names match exactly
        assert!(matches!(
            procedure.value::<i32>("@quantity"),
            Err(ProcedureError::ParameterNotFound(_))
        ));
        assert!(matches!(
            procedure.set_value("quantity", 5),
            Err(ProcedureError::ParameterNotFound(_))
        ));

        procedure.dispose().await;
    }

    #[tokio::test]
    async fn instances_are_independent() {
        let backend = widgets_backend();
        let template = get_widgets();

        let mut first = template.instantiate();
        let mut second = template.instantiate();
        first.initialize(&backend).await.unwrap();
        second.initialize(&backend).await.unwrap();

        first.set_value("@WIDGET_ID", 1).unwrap();
        second.set_value("@WIDGET_ID", 2).unwrap();
        assert_eq!(first.value::<i32>("@WIDGET_ID").unwrap(), Some(1));
        assert_eq!(second.value::<i32>("@WIDGET_ID").unwrap(), Some(2));

        // The template itself stays untouched
        assert_eq!(template.parameters().len(), 1);
        assert!(template.parameters()[0].raw_value().is_null());
        assert_eq!(backend.stats().connections_opened(), 2);

        first.dispose().await;
        second.dispose().await;
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let backend = widgets_backend();
        let mut procedure = get_widgets().instantiate();
        procedure.initialize(&backend).await.unwrap();

        procedure.dispose().await;
        procedure.dispose().await;

        assert!(procedure.is_disposed());
        assert_eq!(backend.stats().connections_closed(), 1);
        assert_eq!(backend.stats().open_connections(), 0);

        assert!(matches!(
            procedure.set_value("@WIDGET_ID", 1),
            Err(ProcedureError::UseAfterDispose(_))
        ));
        assert!(matches!(
            procedure.execute_json().await,
            Err(ProcedureError::UseAfterDispose(_))
        ));
        assert!(matches!(
            procedure.initialize(&backend).await,
            Err(ProcedureError::UseAfterDispose(_))
        ));
        assert!(matches!(
            procedure.validate(),
            Err(ProcedureError::UseAfterDispose(_))
        ));
    }

    #[tokio::test]
    async fn close_failures_are_not_propagated() {
        let backend = widgets_backend();
        backend.fail_on_close(true);
        let mut procedure = get_widgets().instantiate();
        procedure.initialize(&backend).await.unwrap();

        procedure.dispose().await;
        assert!(procedure.is_disposed());
        assert_eq!(backend.stats().open_connections(), 0);
    }

    #[tokio::test]
    async fn dropping_releases_the_connection() {
        let backend = widgets_backend();
        {
            let mut procedure = get_widgets().instantiate();
            procedure.initialize(&backend).await.unwrap();
            assert_eq!(backend.stats().open_connections(), 1);
        }
        assert_eq!(backend.stats().open_connections(), 0);
        assert_eq!(backend.stats().connections_closed(), 0);
    }

    #[tokio::test]
    async fn connection_failures() {
        let backend = widgets_backend();
        backend.set_unreachable(TARGET);

        let mut procedure = get_widgets().instantiate();
        assert!(matches!(
            procedure.initialize(&backend).await,
            Err(ProcedureError::BackendUnavailable(_))
        ));
        assert!(!procedure.is_initialized());

        let mut untargeted =
            Procedure::new("open", "GET_widgets", RoutineType::Procedure).instantiate();
        assert!(matches!(
            untargeted.initialize(&backend).await,
            Err(ProcedureError::MissingConnectionTarget(_))
        ));
    }

    #[tokio::test]
    async fn execution_failures() {
        let backend = MockBackend::new();
        let mut procedure = Procedure::new("open", "missing", RoutineType::Procedure)
            .with_connection_target(ConnectionTarget::new(TARGET));
        procedure.initialize(&backend).await.unwrap();

        let err = procedure.execute_non_query().await.unwrap_err();
        assert!(matches!(err, ProcedureError::ExecutionFailed(_)));
        assert_eq!(err.user_error_message(), "Operation failed");

        procedure.dispose().await;
    }

    #[tokio::test]
    async fn uninitialized_execution_is_rejected() {
        let mut procedure = get_widgets().instantiate();
        procedure.set_value("@WIDGET_ID", 1).unwrap();

        assert!(matches!(
            procedure.execute_json().await,
            Err(ProcedureError::InvalidState(_))
        ));
    }

    #[test]
    fn catalog_form() {
        let procedure: Procedure = serde_json::from_str(
            r#"{
                "specificSchema": "open",
                "specificName": "GET_widgets",
                "routineType": "PROCEDURE",
                "isJsonResult": true,
                "isSingleResult": true,
                "isAlwaysEncrypted": false,
                "isNonQuery": false,
                "parameters": [
                    {"ordinalPosition": 1, "parameterMode": "IN", "isResult": "NO",
                     "parameterName": "@WIDGET_ID", "dataType": "int", "isNullable": false}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(procedure.key(), "[open].[GET_widgets]");
        assert!(procedure.produces_json());
        assert!(procedure.is_single_result());
        assert_eq!(procedure.parameters().len(), 1);

        let serialized = serde_json::to_value(&procedure).unwrap();
        assert_eq!(serialized["specificName"], "GET_widgets");
        assert_eq!(serialized["parameters"][0]["parameterName"], "@WIDGET_ID");
        assert!(serialized.get("connectionTarget").is_none());
    }
}
