// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::ops::{Deref, DerefMut};

use http::{Method, StatusCode};
use tracing::{debug, warn};

use crate::{
    catalog::ProcedureCatalog,
    error::ProcedureError,
    naming,
    parameter::ParameterMode,
    procedure::Procedure,
    value::Value,
};

/// Parameter whose value replaces the response body for non-success statuses.
pub const MESSAGE_RESULT: &str = "@MESSAGE_RESULT";

pub const APPLICATION_JSON: &str = "application/json";

/// A procedure exposed as an HTTP endpoint. Inputs arrive under their wire names (`widgetId`) and
/// the return value doubles as the HTTP status.
#[derive(Debug)]
pub struct RestProcedure {
    procedure: Procedure,
}

impl RestProcedure {
    pub fn new(procedure: Procedure) -> Self {
        Self { procedure }
    }

    pub fn into_inner(self) -> Procedure {
        self.procedure
    }

    /// Binds query-string pairs. Values are text and converted to each parameter's type.
    pub fn load_from_query<I, K, V>(&mut self, pairs: I) -> Result<(), ProcedureError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in pairs {
            let name = naming::to_sql_name(key.as_ref());
            self.procedure
                .set_untyped(name, Value::Text(value.into()))?;
        }
        Ok(())
    }

    /// Binds the members of a flat JSON object. An empty body binds nothing.
    pub fn load_from_json(&mut self, json: &str) -> Result<(), ProcedureError> {
        if json.trim().is_empty() {
            return Ok(());
        }

        let document: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| ProcedureError::InvalidPayload(e.to_string()))?;
        let serde_json::Value::Object(members) = document else {
            return Err(ProcedureError::InvalidPayload(
                "Expected a JSON object".to_string(),
            ));
        };

        for (key, value) in members {
            let value = Value::from_json(value)
                .map_err(|e| ProcedureError::InvalidPayload(format!("{key}: {e}")))?;
            self.procedure
                .set_untyped(naming::to_sql_name(&key), value)?;
        }
        Ok(())
    }

    /// Executes the procedure and shapes the HTTP response.
    pub async fn get_response(&mut self) -> Result<RestResponse, ProcedureError> {
        let json = self.procedure.execute_json().await?;

        // Functions carry no result parameter, so their first parameter is an ordinary input
        let code = match self.procedure.parameters().iter().find(|p| p.is_result()) {
            Some(result) => result.value::<i64>()?,
            None => None,
        };

        let status = match code {
            None => StatusCode::OK,
            Some(code) => u16::try_from(code)
                .ok()
                .and_then(|code| StatusCode::from_u16(code).ok())
                .unwrap_or_else(|| {
                    warn!(procedure = %self.procedure.key(), code, "Invalid status code");
                    StatusCode::INTERNAL_SERVER_ERROR
                }),
        };

        let body = if status.is_success() {
            json
        } else {
            match self.procedure.parameter(MESSAGE_RESULT) {
                Ok(message) => message.value::<String>()?.unwrap_or_default(),
                Err(_) => json,
            }
        };

        Ok(RestResponse::new(status, body))
    }

    /// The endpoint name: `GET_widgets` is served as `widgets`.
    pub fn endpoint_name(&self) -> String {
        naming::from_sql_procedure_name(self.procedure.name())
    }

    fn input_names(&self) -> impl Iterator<Item = String> + '_ {
        self.procedure
            .parameters()
            .iter()
            .filter(|p| !p.is_result() && p.mode() == ParameterMode::In)
            .map(|p| p.json_name())
    }

    /// How to call the endpoint with a query string: `open/widgets?widgetId={widgetId}`.
    pub fn query_template(&self) -> String {
        let query = self
            .input_names()
            .map(|name| format!("{name}={{{name}}}"))
            .collect::<Vec<_>>()
            .join("&");

        let path = format!("{}/{}", self.procedure.schema(), self.endpoint_name());
        if query.is_empty() {
            path
        } else {
            format!("{path}?{query}")
        }
    }

    /// How to call the endpoint with a JSON body: `{"widgetId": "value"}`.
    pub fn json_template(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.input_names()
                .map(|name| (name, serde_json::Value::String("value".to_string())))
                .collect(),
        )
    }
}

impl Deref for RestProcedure {
    type Target = Procedure;

    fn deref(&self) -> &Self::Target {
        &self.procedure
    }
}

impl DerefMut for RestProcedure {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.procedure
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestResponse {
    pub status: StatusCode,
    pub body: String,
}

impl RestResponse {
    pub fn new(status: StatusCode, body: String) -> Self {
        Self { status, body }
    }

    pub fn content_type(&self) -> &'static str {
        APPLICATION_JSON
    }

    pub fn from_error(error: &ProcedureError) -> Self {
        let body = serde_json::json!({
            "errors": [{ "message": error.user_error_message() }]
        });
        Self::new(error.status_code(), body.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RestInput {
    Query(Vec<(String, String)>),
    Json(String),
}

#[derive(Debug, Clone)]
pub struct RestRequest {
    pub method: Method,
    pub schema: String,
    pub name: String,
    pub input: RestInput,
}

/// Resolves and runs a REST request. The procedure is disposed whatever the outcome; failures
/// become JSON error responses.
pub async fn handle(catalog: &ProcedureCatalog, request: RestRequest) -> RestResponse {
    debug!(method = %request.method, schema = %request.schema, name = %request.name, "REST request");

    let mut procedure = match catalog
        .lookup_rest(&request.method, &request.schema, &request.name)
        .await
    {
        Ok(procedure) => procedure,
        Err(e) => return RestResponse::from_error(&e),
    };

    let result = respond(&mut procedure, request.input).await;
    procedure.dispose().await;

    result.unwrap_or_else(|e| RestResponse::from_error(&e))
}

async fn respond(
    procedure: &mut RestProcedure,
    input: RestInput,
) -> Result<RestResponse, ProcedureError> {
    match input {
        RestInput::Query(pairs) => procedure.load_from_query(pairs)?,
        RestInput::Json(body) => procedure.load_from_json(&body)?,
    }
    procedure.validate()?;
    procedure.get_response().await
}
