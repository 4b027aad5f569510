// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use actix_web::{
    HttpRequest, HttpResponse,
    http::header::ContentType,
    web::{self, ServiceConfig},
};
use common::env_const::{get_rest_http_path, is_rebuild_enabled};
use procedure_core::{ProcedureCatalog, RestInput, RestRequest, RestResponse, rest};
use restsql_env::{EnvError, Environment};
use tracing::{error, info};

macro_rules! error_msg {
    ($msg:literal) => {
        concat!("{\"errors\": [{\"message\":\"", $msg, "\"}]}")
    };
}

/// Router settings read from the environment.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub prefix: String,
    pub rebuild_enabled: bool,
}

impl RouterSettings {
    pub fn from_env(env: &dyn Environment) -> Result<Self, EnvError> {
        Ok(Self {
            prefix: get_rest_http_path(env),
            rebuild_enabled: is_rebuild_enabled(env)?,
        })
    }
}

/// Routes under the REST prefix (`/api` by default):
///
/// - `GET|POST|PUT|DELETE /{schema}/{name}` invokes the matching procedure
/// - `GET /_help/{schema}` describes the procedures of a schema
/// - `POST /_rebuild` reloads the catalog (only when `RESTSQL_ENABLE_REBUILD` is set)
pub fn configure_router(
    catalog: web::Data<ProcedureCatalog>,
    settings: RouterSettings,
) -> impl FnOnce(&mut ServiceConfig) {
    move |app| {
        let mut scope =
            web::scope(&settings.prefix).route("/_help/{schema}", web::get().to(help));
        if settings.rebuild_enabled {
            scope = scope.route("/_rebuild", web::post().to(rebuild));
        }
        scope = scope.route("/{schema}/{name}", web::route().to(invoke));

        app.app_data(catalog)
            .service(scope)
            .default_service(web::to(not_found));
    }
}

async fn invoke(
    http_request: HttpRequest,
    path: web::Path<(String, String)>,
    query: web::Query<Vec<(String, String)>>,
    body: String,
    catalog: web::Data<ProcedureCatalog>,
) -> HttpResponse {
    let Some(method) = to_http_method(http_request.method()) else {
        return not_found().await;
    };

    let (schema, name) = path.into_inner();
    let input = if method == http::Method::GET {
        RestInput::Query(query.into_inner())
    } else {
        RestInput::Json(body)
    };

    let response = rest::handle(
        catalog.as_ref(),
        RestRequest {
            method,
            schema,
            name,
            input,
        },
    )
    .await;

    to_actix_response(response)
}

async fn help(path: web::Path<String>, catalog: web::Data<ProcedureCatalog>) -> HttpResponse {
    let help = catalog.help(&path.into_inner()).await;

    HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(help.to_string())
}

async fn rebuild(catalog: web::Data<ProcedureCatalog>) -> HttpResponse {
    match catalog.rebuild().await {
        Ok(count) => {
            info!("Catalog rebuilt with {count} procedures");
            HttpResponse::Ok()
                .content_type(ContentType::json())
                .body(serde_json::json!({ "procedures": count }).to_string())
        }
        Err(e) => {
            error!("Catalog rebuild failed: {e}");
            HttpResponse::InternalServerError()
                .content_type(ContentType::json())
                .body(error_msg!("Catalog rebuild failed"))
        }
    }
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound()
        .content_type(ContentType::json())
        .body(error_msg!("Not found"))
}

fn to_actix_response(response: RestResponse) -> HttpResponse {
    let status = match actix_web::http::StatusCode::from_u16(response.status.as_u16()) {
        Ok(status) => status,
        Err(err) => {
            error!("Invalid status code: {}", err);
            return HttpResponse::InternalServerError()
                .content_type(ContentType::json())
                .body(error_msg!("Invalid status code"));
        }
    };

    HttpResponse::build(status)
        .content_type(response.content_type())
        .body(response.body)
}

// Actix uses http-0.2. However, the rest of the system uses
// http-1.x, so we need to convert between the two.
// Once Actix 5.x is released (which uses http-1.x), we can remove this mapping.
fn to_http_method(method: &actix_web::http::Method) -> Option<http::Method> {
    match *method {
        actix_web::http::Method::GET => Some(http::Method::GET),
        actix_web::http::Method::POST => Some(http::Method::POST),
        actix_web::http::Method::PUT => Some(http::Method::PUT),
        actix_web::http::Method::DELETE => Some(http::Method::DELETE),
        actix_web::http::Method::PATCH => Some(http::Method::PATCH),
        actix_web::http::Method::HEAD => Some(http::Method::HEAD),
        actix_web::http::Method::OPTIONS => Some(http::Method::OPTIONS),
        _ => None,
    }
}
