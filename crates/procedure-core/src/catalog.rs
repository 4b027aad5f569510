// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::{collections::HashMap, sync::Arc};

use common::env_const::{CATALOG_CONNECTION, get_catalog_routine, get_connection_targets};
use http::Method;
use restsql_env::Environment;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    backend::{Backend, ConnectionTarget},
    error::ProcedureError,
    naming,
    procedure::{Procedure, RoutineType},
    rest::RestProcedure,
};

/// Named connection targets, keyed by lower-cased name.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTargets {
    targets: HashMap<String, ConnectionTarget>,
}

impl ConnectionTargets {
    pub fn from_env(env: &dyn Environment) -> Result<Self, ProcedureError> {
        let targets: HashMap<_, _> = get_connection_targets(env)
            .into_iter()
            .map(|(name, url)| (name, ConnectionTarget::new(url)))
            .collect();

        if targets.is_empty() {
            return Err(ProcedureError::MissingConnectionTarget(
                "any schema (no connection targets are configured)".to_string(),
            ));
        }

        Ok(Self { targets })
    }

    pub fn get(&self, name: &str) -> Result<&ConnectionTarget, ProcedureError> {
        self.targets
            .get(&name.to_lowercase())
            .ok_or_else(|| ProcedureError::MissingConnectionTarget(name.to_string()))
    }
}

/// An immutable set of templates. Replaced as a whole on rebuild.
#[derive(Debug, Default)]
struct CatalogSnapshot {
    /// Keyed by `[schema].[name]`.
    procedures: HashMap<String, Arc<Procedure>>,
    /// `[schema].[UPPER_SNAKE_NAME]` to the key in `procedures`.
    rest_index: HashMap<String, String>,
}

impl CatalogSnapshot {
    fn new(
        templates: Vec<Procedure>,
        targets: &ConnectionTargets,
    ) -> Result<Self, ProcedureError> {
        let mut snapshot = Self::default();

        for mut template in templates {
            let target = targets.get(template.schema())?;
            let target = if template.requires_encrypted_transport() {
                target.with_encrypted_transport()
            } else {
                target.clone()
            };
            template.prepare(target)?;

            let key = template.key();
            snapshot.rest_index.insert(
                rest_key(template.schema(), template.name()),
                key.clone(),
            );
            if snapshot
                .procedures
                .insert(key.clone(), Arc::new(template))
                .is_some()
            {
                warn!("Procedure {key} is listed more than once in the catalog");
            }
        }

        Ok(snapshot)
    }
}

fn rest_key(schema: &str, name: &str) -> String {
    format!("[{schema}].[{}]", naming::to_underscore(name))
}

/// The procedures available for invocation, loaded from the catalog routine.
///
/// Lookups never hand out a template: they return an initialized copy owned by the caller, who
/// must dispose it.
pub struct ProcedureCatalog {
    backend: Arc<dyn Backend>,
    env: Arc<dyn Environment>,
    snapshot: RwLock<Arc<CatalogSnapshot>>,
}

impl ProcedureCatalog {
    /// An empty catalog. Call [`ProcedureCatalog::build`] to load it.
    pub fn new(backend: Arc<dyn Backend>, env: Arc<dyn Environment>) -> Self {
        Self {
            backend,
            env,
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::default())),
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Loads the catalog and swaps it in. On failure the current catalog stays in place.
    /// Returns the number of procedures loaded.
    pub async fn build(&self) -> Result<usize, ProcedureError> {
        let targets = ConnectionTargets::from_env(self.env.as_ref())?;
        let document = self.load_document(&targets).await?;

        let templates: Vec<Procedure> = if document.trim().is_empty() {
            vec![]
        } else {
            serde_json::from_str(&document).map_err(|e| {
                ProcedureError::CatalogLoad(format!("Invalid catalog document: {e}"))
            })?
        };

        let snapshot = CatalogSnapshot::new(templates, &targets)?;
        let count = snapshot.procedures.len();
        *self.snapshot.write().await = Arc::new(snapshot);

        info!("Loaded {count} procedures");
        Ok(count)
    }

    pub async fn rebuild(&self) -> Result<usize, ProcedureError> {
        self.build().await
    }

    async fn load_document(&self, targets: &ConnectionTargets) -> Result<String, ProcedureError> {
        let (schema, name) = get_catalog_routine(self.env.as_ref());
        let target = targets.get(CATALOG_CONNECTION)?;

        let mut routine = Procedure::new(schema, name, RoutineType::Function)
            .with_json_result(true)
            .with_connection_target(target.clone());

        let result = match routine.initialize(self.backend.as_ref()).await {
            Ok(()) => routine.execute_json().await,
            Err(e) => Err(e),
        };
        routine.dispose().await;

        result
    }

    async fn current(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.read().await.clone()
    }

    async fn instantiate(&self, template: &Procedure) -> Result<Procedure, ProcedureError> {
        let mut procedure = template.instantiate();
        procedure.initialize(self.backend.as_ref()).await?;
        Ok(procedure)
    }

    /// An initialized copy of `[schema].[name]`.
    pub async fn lookup(&self, schema: &str, name: &str) -> Result<Procedure, ProcedureError> {
        let key = format!("[{schema}].[{name}]");
        let snapshot = self.current().await;
        let template = snapshot
            .procedures
            .get(&key)
            .ok_or(ProcedureError::ProcedureNotFound(key))?;

        debug!(procedure = %template.key(), "Lookup");
        self.instantiate(template).await
    }

    /// An initialized copy of the procedure serving `method` on `schema/name`: `GET open/widgets`
    /// resolves to `[open].[GET_widgets]` (names compare in `UPPER_SNAKE` form).
    pub async fn lookup_rest(
        &self,
        method: &Method,
        schema: &str,
        name: &str,
    ) -> Result<RestProcedure, ProcedureError> {
        let routine_name = format!("{}_{name}", method.as_str());
        if !naming::VERB_PREFIXES.contains(&method.as_str()) {
            return Err(ProcedureError::ProcedureNotFound(format!(
                "[{schema}].[{routine_name}]"
            )));
        }

        let key = rest_key(schema, &routine_name);
        let snapshot = self.current().await;
        let template = snapshot
            .rest_index
            .get(&key)
            .and_then(|key| snapshot.procedures.get(key))
            .ok_or(ProcedureError::ProcedureNotFound(key))?;

        debug!(procedure = %template.key(), %method, "REST lookup");
        Ok(RestProcedure::new(self.instantiate(template).await?))
    }

    /// The templates of `schema` with, for REST-exposed ones, how to call them.
    pub async fn help(&self, schema: &str) -> serde_json::Value {
        let snapshot = self.current().await;

        let mut templates: Vec<_> = snapshot
            .procedures
            .values()
            .filter(|p| p.schema() == schema)
            .collect();
        templates.sort_by(|a, b| a.name().cmp(b.name()));

        let procedures = templates
            .into_iter()
            .filter_map(|template| {
                let mut entry = serde_json::to_value(template.as_ref()).ok()?;

                if let (Some((verb, _)), serde_json::Value::Object(fields)) =
                    (naming::strip_verb_prefix(template.name()), &mut entry)
                {
                    let rest = RestProcedure::new(template.instantiate());
                    fields.insert(
                        "endpoint".to_string(),
                        serde_json::json!({
                            "method": verb,
                            "query": rest.query_template(),
                            "json": rest.json_template(),
                        }),
                    );
                }
                Some(entry)
            })
            .collect();

        serde_json::Value::Array(procedures)
    }

    pub async fn len(&self) -> usize {
        self.current().await.procedures.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
