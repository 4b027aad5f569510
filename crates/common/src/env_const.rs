use restsql_env::{EnvError, Environment, parse_value};

pub const RESTSQL_LOG: &str = "RESTSQL_LOG";

/// Prefix of the variables naming connection targets: `RESTSQL_CONNECTION_SALES=postgres://...`
/// declares the target `sales`.
pub const RESTSQL_CONNECTION_PREFIX: &str = "RESTSQL_CONNECTION_";
pub const RESTSQL_CONNECTION_POOL_SIZE: &str = "RESTSQL_CONNECTION_POOL_SIZE";
pub const RESTSQL_CHECK_CONNECTION_ON_STARTUP: &str = "RESTSQL_CHECK_CONNECTION_ON_STARTUP";

pub const RESTSQL_CATALOG_SCHEMA: &str = "RESTSQL_CATALOG_SCHEMA";
pub const RESTSQL_CATALOG_PROCEDURE: &str = "RESTSQL_CATALOG_PROCEDURE";

pub const RESTSQL_SERVER_PORT: &str = "RESTSQL_SERVER_PORT";
pub const RESTSQL_SERVER_HOST: &str = "RESTSQL_SERVER_HOST";
pub const RESTSQL_REST_HTTP_PATH: &str = "RESTSQL_REST_HTTP_PATH";
pub const RESTSQL_ENABLE_REBUILD: &str = "RESTSQL_ENABLE_REBUILD";

pub const _RESTSQL_DEPLOYMENT_MODE: &str = "_RESTSQL_DEPLOYMENT_MODE"; // "dev" or "prod" (default)

/// Name of the connection target that hosts the catalog routine.
pub const CATALOG_CONNECTION: &str = "restsql";

#[derive(Debug, PartialEq, Eq)]
pub enum DeploymentMode {
    Dev,
    Prod,
}

pub fn get_deployment_mode(env: &dyn Environment) -> Result<DeploymentMode, EnvError> {
    match env.get(_RESTSQL_DEPLOYMENT_MODE).as_deref() {
        Some("dev") => Ok(DeploymentMode::Dev),
        Some("prod") | None => Ok(DeploymentMode::Prod),
        Some(other) => Err(EnvError::InvalidEnum {
            env_key: _RESTSQL_DEPLOYMENT_MODE,
            env_value: other.to_string(),
            message: "Must be one of 'dev' or 'prod'".to_string(),
        }),
    }
}

/// Connection targets declared in the environment, keyed by lower-cased name.
pub fn get_connection_targets(env: &dyn Environment) -> Vec<(String, String)> {
    env.vars_with_prefix(RESTSQL_CONNECTION_PREFIX)
        .into_iter()
        .filter(|(name, _)| name != "POOL_SIZE")
        .map(|(name, url)| (name.to_lowercase(), url))
        .collect()
}

pub fn get_connection_pool_size(env: &dyn Environment) -> Result<Option<usize>, EnvError> {
    parse_value(
        env.get(RESTSQL_CONNECTION_POOL_SIZE),
        RESTSQL_CONNECTION_POOL_SIZE,
    )
}

pub fn get_check_connection_on_startup(env: &dyn Environment) -> Result<bool, EnvError> {
    env.enabled(RESTSQL_CHECK_CONNECTION_ON_STARTUP, false)
}

/// Schema and name of the routine returning the procedure catalog.
pub fn get_catalog_routine(env: &dyn Environment) -> (String, String) {
    (
        env.get_or_else(RESTSQL_CATALOG_SCHEMA, "restsql"),
        env.get_or_else(RESTSQL_CATALOG_PROCEDURE, "PROCEDURES"),
    )
}

pub fn get_server_port(env: &dyn Environment) -> Result<u16, EnvError> {
    Ok(parse_value(env.get(RESTSQL_SERVER_PORT), RESTSQL_SERVER_PORT)?.unwrap_or(9876))
}

pub fn get_rest_http_path(env: &dyn Environment) -> String {
    env.get(RESTSQL_REST_HTTP_PATH)
        .unwrap_or_else(|| "/api".to_string())
}

pub fn is_rebuild_enabled(env: &dyn Environment) -> Result<bool, EnvError> {
    env.enabled(RESTSQL_ENABLE_REBUILD, false)
}

#[cfg(test)]
mod tests {
    use restsql_env::MapEnvironment;

    use super::*;

    #[test]
    fn connection_targets_skip_settings() {
        let env = MapEnvironment::from([
            ("RESTSQL_CONNECTION_RESTSQL", "postgres://meta"),
            ("RESTSQL_CONNECTION_Open", "postgres://open"),
            ("RESTSQL_CONNECTION_POOL_SIZE", "4"),
        ]);

        assert_eq!(
            get_connection_targets(&env),
            vec![
                ("open".to_string(), "postgres://open".to_string()),
                ("restsql".to_string(), "postgres://meta".to_string()),
            ]
        );
        assert_eq!(get_connection_pool_size(&env).unwrap(), Some(4));
    }

    #[test]
    fn defaults() {
        let env = MapEnvironment::new();

        assert_eq!(
            get_catalog_routine(&env),
            ("restsql".to_string(), "PROCEDURES".to_string())
        );
        assert_eq!(get_server_port(&env).unwrap(), 9876);
        assert_eq!(get_rest_http_path(&env), "/api");
        assert!(!is_rebuild_enabled(&env).unwrap());
        assert_eq!(get_deployment_mode(&env).unwrap(), DeploymentMode::Prod);
    }

    #[test]
    fn invalid_deployment_mode() {
        let env = MapEnvironment::from([(_RESTSQL_DEPLOYMENT_MODE, "staging")]);
        assert!(get_deployment_mode(&env).is_err());
    }
}
