// Copyright Exograph, Inc. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file at the root of this repository.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use rustls::RootCertStore;
use rustls_native_certs::load_native_certs;
use rustls_pki_types::{CertificateDer, pem::PemObject};

use crate::database_error::DatabaseError;
use tokio_postgres::config::SslMode;

#[derive(Debug, PartialEq)]
pub(crate) struct SslConfig {
    mode: SslMode,
    root_cert_path: Option<String>,
}

impl SslConfig {
    pub(crate) fn from_url(url: &str) -> Result<(String, Option<SslConfig>), DatabaseError> {
        let url = url::Url::parse(url)
            .map_err(|_| DatabaseError::Config("Invalid database URL".into()))?;

        let mut ssl_param_string: Option<String> = None;
        let mut ssl_mode_string: Option<String> = None;
        let mut ssl_root_cert_string = None;

        // The driver doesn't understand these parameters; capture them for the TLS setup instead.
        let query_pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, value)| {
                if name == "ssl" {
                    ssl_param_string = Some(value.to_string());
                    false
                } else if name == "sslmode" {
                    ssl_mode_string = Some(value.to_string());
                    false
                } else if name == "sslrootcert" {
                    ssl_root_cert_string = Some(value.to_string());
                    false
                } else {
                    true
                }
            })
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let mut cleaned_url = url.clone();
        if query_pairs.is_empty() {
            cleaned_url.set_query(None);
        } else {
            cleaned_url
                .query_pairs_mut()
                .clear()
                .extend_pairs(query_pairs);
        }

        // The driver doesn't accept '+' as an encoded space
        let url = cleaned_url.as_str().replace('+', "%20");

        let mut ssl_mode = SslMode::Prefer;

        // "ssl=true" is shorthand for a required TLS connection; "sslmode" may refine it afterwards.
        if let Some(ssl_param) = ssl_param_string {
            match ssl_param.as_str().parse() {
                Ok(true) => ssl_mode = SslMode::Require,
                Ok(false) => ssl_mode = SslMode::Prefer,
                _ => {
                    return Err(DatabaseError::Config(format!(
                        "Invalid 'ssl' parameter value {ssl_param}. Must be a 'true' or 'false'",
                    )));
                }
            }
        }
        // tokio-postgres can't express every sslmode, so pick the nearest stricter one
        if let Some(ssl_mode_string) = ssl_mode_string {
            match ssl_mode_string.as_str() {
                "verify-full" | "verify-ca" | "require" => ssl_mode = SslMode::Require,
                "prefer" | "allow" => ssl_mode = SslMode::Prefer,
                "disable" => ssl_mode = SslMode::Disable,
                _ => {
                    return Err(DatabaseError::Config(format!(
                        "Invalid 'sslmode' parameter value {ssl_mode_string}"
                    )));
                }
            }
        }

        let ssl_config = if ssl_mode == SslMode::Disable {
            None
        } else {
            Some(SslConfig {
                mode: ssl_mode,
                root_cert_path: ssl_root_cert_string,
            })
        };

        Ok((url, ssl_config))
    }

    pub(crate) fn updated_config(
        self,
        mut config: tokio_postgres::Config,
    ) -> Result<
        (
            tokio_postgres::Config,
            tokio_postgres_rustls::MakeRustlsConnect,
        ),
        DatabaseError,
    > {
        config.ssl_mode(self.mode);

        let tls = {
            let mut root_store = RootCertStore::empty();

            match self.root_cert_path {
                Some(cert_path) => {
                    let certs = CertificateDer::pem_file_iter(&cert_path).map_err(|e| {
                        DatabaseError::Config(format!(
                            "Failed to open certificate file '{cert_path}': {e}"
                        ))
                    })?;

                    for cert in certs {
                        let cert = cert.map_err(|e| {
                            DatabaseError::Config(format!(
                                "Invalid certificate in '{cert_path}': {e}"
                            ))
                        })?;
                        root_store.add(cert)?;
                    }
                }
                None => {
                    root_store.add_parsable_certificates(load_native_certs().certs);
                }
            }

            // install_default fails only if a provider is already installed
            let _existing = rustls::crypto::ring::default_provider().install_default();
            let config = rustls::ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth();
            tokio_postgres_rustls::MakeRustlsConnect::new(config)
        };

        Ok((config, tls))
    }
}
