// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use http::StatusCode;
use thiserror::Error;
use tracing::error;

use crate::{backend::BackendError, value::ValueKind};

#[derive(Error, Debug)]
pub enum ProcedureError {
    #[error("Parameter {parameter} requires a value")]
    RequiredValueMissing { parameter: String },

    #[error("Value of parameter {parameter} exceeds {max_length} characters")]
    ValueTooLong { parameter: String, max_length: i32 },

    #[error("Value of parameter {parameter} is out of range")]
    OutOfRange { parameter: String },

    #[error("Value of parameter {parameter} does not match the expected format")]
    PatternMismatch { parameter: String },

    #[error("Parameter {parameter} expects {expected} but got {actual}")]
    TypeMismatch {
        parameter: String,
        expected: String,
        actual: ValueKind,
    },

    #[error("Parameter {parameter} has unsupported data type {data_type}")]
    UnsupportedDataType { parameter: String, data_type: String },

    #[error("Parameter {0} not found")]
    ParameterNotFound(String),

    #[error("Procedure {0} not found")]
    ProcedureNotFound(String),

    #[error("Procedure {0} does not produce a JSON result")]
    InvalidResultMode(String),

    #[error("No connection target configured for {0}")]
    MissingConnectionTarget(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(#[source] BackendError),

    #[error("Procedure {0} has been disposed")]
    UseAfterDispose(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(#[source] BackendError),

    #[error("Could not load the procedure catalog: {0}")]
    CatalogLoad(String),
}

impl ProcedureError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProcedureError::RequiredValueMissing { .. }
            | ProcedureError::ValueTooLong { .. }
            | ProcedureError::OutOfRange { .. }
            | ProcedureError::PatternMismatch { .. }
            | ProcedureError::TypeMismatch { .. }
            | ProcedureError::ParameterNotFound(_)
            | ProcedureError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ProcedureError::ProcedureNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message safe to show to a client. Server-side failures are logged and replaced with a
    /// generic message so that backend details don't leak.
    pub fn user_error_message(&self) -> String {
        if self.status_code().is_client_error() {
            self.to_string()
        } else {
            error!("{self}");
            "Operation failed".to_string()
        }
    }
}

impl From<BackendError> for ProcedureError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::Connection(_) | BackendError::Closed => {
                ProcedureError::BackendUnavailable(error)
            }
            _ => ProcedureError::ExecutionFailed(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(
            ProcedureError::RequiredValueMissing {
                parameter: "@WIDGET_ID".into()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProcedureError::InvalidPayload("nested".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProcedureError::ProcedureNotFound("[open].[GET_X]".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ProcedureError::from(BackendError::Closed).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn server_errors_are_not_exposed() {
        let err = ProcedureError::ExecutionFailed(BackendError::Decode(
            "relation \"secret\" does not exist".into(),
        ));
        assert_eq!(err.user_error_message(), "Operation failed");

        let err = ProcedureError::ParameterNotFound("@COLOR".into());
        assert_eq!(err.user_error_message(), "Parameter @COLOR not found");
    }
}
