pub mod http_config;
