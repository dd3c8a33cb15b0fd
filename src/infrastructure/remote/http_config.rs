use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::application::config::BasicAuth;
use crate::domain::ports::config_source::{ConfigFetchError, RemoteConfigSource};

/// Fetches the remote configuration object with a plain GET.
pub struct HttpConfigSource {
    url: String,
    auth: Option<BasicAuth>,
    client: reqwest::Client,
}

impl HttpConfigSource {
    /// # Errors
    ///
    /// Returns `ConfigFetchError::Request` if the HTTP client cannot be built.
    pub fn new(url: String, auth: Option<BasicAuth>) -> Result<Self, ConfigFetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigFetchError::Request(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            url,
            auth: auth.filter(|a| !a.user.is_empty()),
            client,
        })
    }
}

#[async_trait]
impl RemoteConfigSource for HttpConfigSource {
    async fn fetch(&self) -> Result<Map<String, Value>, ConfigFetchError> {
        tracing::info!("fetching config from [{}]", self.url);
        let mut request = self.client.get(&self.url);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.user, Some(&auth.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ConfigFetchError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ConfigFetchError::Status(status.as_u16()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ConfigFetchError::Request(e.to_string()))?;
        parse_config(&text)
    }
}

/// # Errors
///
/// Returns `ConfigFetchError::Parse` for invalid JSON and
/// `ConfigFetchError::NotAnObject` for any other top-level value.
pub fn parse_config(text: &str) -> Result<Map<String, Value>, ConfigFetchError> {
    match serde_json::from_str(text).map_err(|e| ConfigFetchError::Parse(e.to_string()))? {
        Value::Object(map) => Ok(map),
        _ => Err(ConfigFetchError::NotAnObject),
    }
}
