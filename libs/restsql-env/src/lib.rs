// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod map;

pub use map::MapEnvironment;

pub trait Environment: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// All variables visible through this environment. Used to discover families of keys (such as
    /// every `RESTSQL_CONNECTION_*` entry) whose names aren't known upfront.
    fn vars(&self) -> Vec<(String, String)>;

    fn enabled(&self, key: &str, default_value: bool) -> Result<bool, EnvError> {
        match self.get(key) {
            Some(value) => match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" | "enabled" | "enable" => Ok(true),
                "false" | "0" | "no" | "off" | "disabled" | "disable" => Ok(false),
                _ => Err(EnvError::InvalidBoolean {
                    key: key.to_string(),
                    value,
                }),
            },
            None => Ok(default_value),
        }
    }

    fn get_or_else(&self, key: &str, default_value: &str) -> String {
        self.get(key).unwrap_or(default_value.to_string())
    }

    /// Variables whose key starts with `prefix`, with the prefix removed from the key.
    fn vars_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        let mut vars: Vec<_> = self
            .vars()
            .into_iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(prefix)
                    .filter(|suffix| !suffix.is_empty())
                    .map(|suffix| (suffix.to_string(), value))
            })
            .collect();
        vars.sort();
        vars
    }
}

/// Parse an optional environment value, reporting the key on failure.
pub fn parse_value<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
) -> Result<Option<T>, EnvError> {
    value
        .map(|value| {
            value.trim().parse::<T>().map_err(|_| EnvError::InvalidEnum {
                env_key: key,
                env_value: value.clone(),
                message: "Unable to parse value".to_string(),
            })
        })
        .transpose()
}

#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error(
        "Invalid value for {key}: {value}. Expected true, 1, yes, on, enabled, enable OR false, 0, no, off, disabled, disable"
    )]
    InvalidBoolean { key: String, value: String },

    #[error("Invalid env value {env_value} for {env_key}: {message}")]
    InvalidEnum {
        env_key: &'static str,
        env_value: String,
        message: String,
    },
}

pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn vars(&self) -> Vec<(String, String)> {
        std::env::vars().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_values() {
        let env = MapEnvironment::from([("A", "yes"), ("B", "off"), ("C", "maybe")]);

        assert!(env.enabled("A", false).unwrap());
        assert!(!env.enabled("B", true).unwrap());
        assert!(env.enabled("C", true).is_err());
        assert!(env.enabled("D", true).unwrap());
    }

    #[test]
    fn prefixed_vars_are_stripped_and_sorted() {
        let env = MapEnvironment::from([
            ("RESTSQL_CONNECTION_SALES", "postgres://sales"),
            ("RESTSQL_CONNECTION_OPEN", "postgres://open"),
            ("RESTSQL_CONNECTION_", "ignored"),
            ("OTHER", "x"),
        ]);

        assert_eq!(
            env.vars_with_prefix("RESTSQL_CONNECTION_"),
            vec![
                ("OPEN".to_string(), "postgres://open".to_string()),
                ("SALES".to_string(), "postgres://sales".to_string()),
            ]
        );
    }

    #[test]
    fn parse_reports_key() {
        let err = parse_value::<u16>(Some("abc".into()), "PORT").unwrap_err();
        assert!(err.to_string().contains("PORT"));
        assert_eq!(parse_value::<u16>(Some(" 80 ".into()), "PORT").unwrap(), Some(80));
        assert_eq!(parse_value::<u16>(None, "PORT").unwrap(), None);
    }
}
