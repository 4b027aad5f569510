// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! PostgreSQL connection plumbing: turning a connection URL (including the `ssl`, `sslmode` and
//! `sslrootcert` parameters commonly found in hosted-database URLs) into a pool of clients.
//!
//! Nothing in this crate knows about procedures; it only hands out [`DatabaseClient`]s.

mod connect;

pub mod database_error;

pub use connect::{database_client::DatabaseClient, database_pool::DatabasePool};
