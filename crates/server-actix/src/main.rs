// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use actix_web::{App, HttpServer, middleware, web};

use postgres_backend::PostgresBackend;
use procedure_core::{ProcedureCatalog, ProcedureError};
use server_actix::{RouterSettings, configure_router};
use thiserror::Error;
use tracing_actix_web::TracingLogger;

use std::net::SocketAddr;
use std::time;
use std::{io::ErrorKind, sync::Arc};

use common::{
    env_const::{
        DeploymentMode, RESTSQL_SERVER_HOST, get_deployment_mode, get_server_port,
    },
    logging_tracing::{self, LoggingError},
};

use restsql_env::{Environment, SystemEnvironment};

#[derive(Error)]
enum ServerError {
    #[error("Port {0} is already in use. Check if there is another process running at that port.")]
    PortInUse(u16),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    EnvError(#[from] restsql_env::EnvError),
    #[error("{0}")]
    Logging(#[from] LoggingError),
    #[error("Failed to load the procedure catalog: {0}")]
    Catalog(#[from] ProcedureError),
}

// A custom `Debug` implementation for `ServerError` (that delegate to the `Display` impl), so that
// we don't print the default `Debug` implementation's message when the server exits.
impl std::fmt::Debug for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

/// Serve the procedures listed by the catalog routine over HTTP
#[actix_web::main]
async fn main() -> Result<(), ServerError> {
    let start_time = time::SystemTime::now();

    logging_tracing::init()?;

    let env: Arc<dyn Environment> = Arc::new(SystemEnvironment);

    let backend = Arc::new(PostgresBackend::from_env(env.as_ref())?);
    let catalog = web::Data::new(ProcedureCatalog::new(backend, env.clone()));
    let procedure_count = catalog.build().await?;

    let server_port = get_server_port(env.as_ref())?;

    let settings = RouterSettings::from_env(env.as_ref())?;
    let prefix = settings.prefix.clone();
    let rebuild_enabled = settings.rebuild_enabled;

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(middleware::NormalizePath::new(
                middleware::TrailingSlash::Trim,
            ))
            .configure(configure_router(catalog.clone(), settings.clone()))
    });

    let server = match env.get(RESTSQL_SERVER_HOST) {
        Some(host) => server.bind((host, server_port)),
        None => match get_deployment_mode(env.as_ref())? {
            // Binding to "localhost" covers both the IPv4 and IPv6 loopback addresses
            DeploymentMode::Dev => server.bind(("localhost", server_port)),
            // All interfaces, so that the server is reachable from outside a container
            DeploymentMode::Prod => server.bind(("0.0.0.0", server_port)),
        },
    };

    match server {
        Ok(server) => {
            let pretty_addr = pretty_addr(&server.addrs());

            println!(
                "Started server on {} in {:.2} ms",
                pretty_addr,
                start_time
                    .elapsed()
                    .map(|elapsed| elapsed.as_micros() as f64 / 1000.0)
                    .unwrap_or_default()
            );
            println!("- {procedure_count} procedures hosted at:");
            println!("\thttp://{pretty_addr}{prefix}/{{schema}}/{{name}}");
            println!("- Help hosted at:");
            println!("\thttp://{pretty_addr}{prefix}/_help/{{schema}}");
            if rebuild_enabled {
                println!("- Catalog rebuild at:");
                println!("\tPOST http://{pretty_addr}{prefix}/_rebuild");
            }

            Ok(server.run().await?)
        }
        Err(e) => Err(if e.kind() == ErrorKind::AddrInUse {
            ServerError::PortInUse(server_port)
        } else {
            ServerError::Io(e)
        }),
    }
}

fn pretty_addr(addrs: &[SocketAddr]) -> String {
    let loopback_addr = addrs.iter().find(|addr| addr.ip().is_loopback());

    match loopback_addr {
        Some(addr) => format!("localhost:{}", addr.port()),
        None => match addrs {
            // Print single address without square brackets
            [addr] => format!("{addr}"),
            _ => {
                format!("{addrs:?}")
            }
        },
    }
}
