use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigFetchError {
    #[error("config request failed: {0}")]
    Request(String),
    #[error("config endpoint answered HTTP {0}")]
    Status(u16),
    #[error("config payload is not valid JSON: {0}")]
    Parse(String),
    #[error("config payload is not a JSON object")]
    NotAnObject,
}

/// Remote source of partial configuration updates.
#[async_trait]
pub trait RemoteConfigSource: Send + Sync {
    /// Fetch the current remote configuration object.
    ///
    /// # Errors
    ///
    /// Returns `ConfigFetchError` on transport, status or parse failures.
    async fn fetch(&self) -> Result<Map<String, Value>, ConfigFetchError>;
}
