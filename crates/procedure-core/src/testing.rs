// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! An in-memory [`Backend`] for tests. Routines are closures keyed by `[schema].[name]` that
//! receive the call descriptor, may set output values on it, and return rows.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    backend::{
        Backend, BackendConnection, BackendError, CallDescriptor, ConnectionTarget, ExecutionKind,
        Table,
    },
    value::Value,
};

pub type RoutineHandler =
    Arc<dyn Fn(&mut CallDescriptor) -> Result<Table, BackendError> + Send + Sync>;

type Routines = Arc<Mutex<HashMap<String, RoutineHandler>>>;

/// Counters shared by a [`MockBackend`] and its connections.
#[derive(Debug, Default)]
pub struct MockStats {
    connections_opened: AtomicUsize,
    connections_closed: AtomicUsize,
    connections_released: AtomicUsize,
    executions: AtomicUsize,
}

impl MockStats {
    pub fn connections_opened(&self) -> usize {
        self.connections_opened.load(Ordering::SeqCst)
    }

    /// Connections closed explicitly through [`BackendConnection::close`].
    pub fn connections_closed(&self) -> usize {
        self.connections_closed.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet dropped.
    pub fn open_connections(&self) -> usize {
        self.connections_opened() - self.connections_released.load(Ordering::SeqCst)
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct MockBackend {
    routines: Routines,
    unreachable: Mutex<HashSet<String>>,
    connected: Mutex<Vec<ConnectionTarget>>,
    fail_on_close: Arc<AtomicBool>,
    stats: Arc<MockStats>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the routine addressed by `command_text`, e.g. `[open].[GET_widgets]`.
    pub fn on_routine<F>(&self, command_text: &str, handler: F)
    where
        F: Fn(&mut CallDescriptor) -> Result<Table, BackendError> + Send + Sync + 'static,
    {
        lock(&self.routines).insert(command_text.to_string(), Arc::new(handler));
    }

    /// Registers a routine returning `json` split across rows, the way a JSON-producing routine
    /// streams a large document.
    pub fn on_json_routine(&self, command_text: &str, json: &str) {
        let json = json.to_string();
        self.on_routine(command_text, move |_| Ok(json_rows(&json, 64)));
    }

    pub fn set_unreachable(&self, target: &str) {
        lock(&self.unreachable).insert(target.to_string());
    }

    pub fn fail_on_close(&self, fail: bool) {
        self.fail_on_close.store(fail, Ordering::SeqCst);
    }

    pub fn stats(&self) -> &MockStats {
        &self.stats
    }

    /// Every target a connection was requested for, in order.
    pub fn connected_targets(&self) -> Vec<ConnectionTarget> {
        lock(&self.connected).clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn connect(
        &self,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn BackendConnection>, BackendError> {
        lock(&self.connected).push(target.clone());

        if lock(&self.unreachable).contains(target.as_str()) {
            return Err(BackendError::Connection(
                format!("could not connect to {target}").into(),
            ));
        }

        self.stats.connections_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            routines: self.routines.clone(),
            fail_on_close: self.fail_on_close.clone(),
            stats: self.stats.clone(),
            closed: false,
        }))
    }
}

struct MockConnection {
    routines: Routines,
    fail_on_close: Arc<AtomicBool>,
    stats: Arc<MockStats>,
    closed: bool,
}

#[async_trait]
impl BackendConnection for MockConnection {
    async fn execute(
        &mut self,
        call: &mut CallDescriptor,
        kind: ExecutionKind,
    ) -> Result<Table, BackendError> {
        if self.closed {
            return Err(BackendError::Closed);
        }

        let handler = lock(&self.routines)
            .get(&call.command_text())
            .cloned()
            .ok_or_else(|| {
                BackendError::Execution(
                    format!("Could not find stored procedure {}", call.command_text()).into(),
                )
            })?;

        self.stats.executions.fetch_add(1, Ordering::SeqCst);
        let table = handler(call)?;

        Ok(match kind {
            ExecutionKind::Reader => table,
            ExecutionKind::NonQuery => Table::default(),
        })
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.closed = true;
        self.stats.connections_closed.fetch_add(1, Ordering::SeqCst);

        if self.fail_on_close.load(Ordering::SeqCst) {
            Err(BackendError::Execution("connection reset by peer".into()))
        } else {
            Ok(())
        }
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.stats
            .connections_released
            .fetch_add(1, Ordering::SeqCst);
    }
}

/// A single-column table holding `json` in chunks of at most `chunk_size` characters.
pub fn json_rows(json: &str, chunk_size: usize) -> Table {
    let chars: Vec<char> = json.chars().collect();

    chars
        .chunks(chunk_size.max(1))
        .fold(Table::new(["json"]), |table, chunk| {
            table.with_row(vec![Value::Text(chunk.iter().collect())])
        })
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
