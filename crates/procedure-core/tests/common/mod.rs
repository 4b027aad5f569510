// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#![allow(dead_code)]

use std::sync::Arc;

use procedure_core::{ProcedureCatalog, Value, testing::MockBackend};
use restsql_env::MapEnvironment;

pub const CATALOG: &str = include_str!("../fixtures/catalog.json");
pub const CATALOG_ROUTINE: &str = "[restsql].[PROCEDURES]";

pub fn environment() -> MapEnvironment {
    MapEnvironment::from([
        ("RESTSQL_CONNECTION_RESTSQL", "postgres://meta.local/restsql"),
        ("RESTSQL_CONNECTION_OPEN", "postgres://open.local/widgets"),
        ("RESTSQL_CONNECTION_SALES", "postgres://sales.local/sales"),
    ])
}

/// A backend serving the fixture catalog and `[open].[GET_widgets]`, which answers with the
/// widget and status 200 (404 for widget 404).
pub fn widgets_backend() -> Arc<MockBackend> {
    let backend = Arc::new(MockBackend::new());
    backend.on_json_routine(CATALOG_ROUTINE, CATALOG);
    backend.on_routine("[open].[GET_widgets]", |call| {
        let Some(Value::Int(id)) = call.parameter("@WIDGET_ID").map(|p| p.value.clone()) else {
            panic!("widget id was not bound");
        };
        let status = if id == 404 { 404 } else { 200 };
        if let Some(status_parameter) = call.parameter_mut("@RETURN_VALUE") {
            status_parameter.value = Value::Int(status);
        }
        Ok(procedure_core::testing::json_rows(
            &format!(r#"{{"id":{id},"name":"Bolt"}}"#),
            5,
        ))
    });
    backend
}

pub async fn built_catalog(backend: Arc<MockBackend>) -> ProcedureCatalog {
    let catalog = ProcedureCatalog::new(backend, Arc::new(environment()));
    catalog.build().await.unwrap();
    catalog
}
