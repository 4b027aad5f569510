// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The procedure invocation engine.
//!
//! A [`ProcedureCatalog`] holds one template [`Procedure`] for every stored routine described by
//! the backend's catalog routine. Looking a procedure up produces an independent copy of the
//! template, bound to its own backend connection, on which the caller sets [`Parameter`] values,
//! executes the routine and reads results back. [`RestProcedure`] layers the HTTP conventions
//! (query-string/JSON binding, status code from the return value) on top.
//!
//! The relational driver is abstracted behind [`Backend`] and [`BackendConnection`], which only
//! need to run a [`CallDescriptor`] and report rows and output values.

pub mod backend;
pub mod catalog;
pub mod data_type;
pub mod error;
pub mod naming;
pub mod parameter;
pub mod procedure;
pub mod rest;
pub mod value;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use backend::{
    Backend, BackendConnection, BackendError, BoundParameter, CallDescriptor, ConnectionTarget,
    Direction, ExecutionKind, StorageType, Table,
};
pub use catalog::{ConnectionTargets, ProcedureCatalog};
pub use data_type::DataType;
pub use error::ProcedureError;
pub use parameter::{Parameter, ParameterMode};
pub use procedure::{ParameterRef, Procedure, RoutineType};
pub use rest::{RestInput, RestProcedure, RestRequest, RestResponse};
pub use value::{FromValue, Value, ValueKind};
