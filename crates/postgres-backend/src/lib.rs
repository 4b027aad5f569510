// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! PostgreSQL implementation of [`procedure_core::Backend`].
//!
//! Routines are PostgreSQL functions called with named arguments:
//!
//! ```sql
//! SELECT * FROM "open"."GET_widgets"("widget_id" => $1::int4)
//! ```
//!
//! Output parameters (including the `@RETURN_VALUE` status of a `PROCEDURE`) are returned as
//! result columns named after the parameter (`return_value`). Those columns are read from the
//! first row and removed from the returned table.

mod connection;
mod postgres_backend;
mod statement;
mod value_codec;

pub use postgres_backend::PostgresBackend;
