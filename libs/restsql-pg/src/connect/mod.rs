pub mod database_client;
pub mod database_pool;
pub(crate) mod ssl_config;
