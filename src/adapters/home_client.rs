//! Home-automation control API client
//!
//! Every configured tool descriptor becomes a [`RemoteFunction`] that posts
//! its keyword arguments to `{base_url}/functions/{name}`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::agents::codec::Arguments;
use crate::agents::domain::ToolDescriptor;
use crate::agents::registry::{FunctionRegistry, HomeFunction};
use crate::config::HomeSettings;

/// HTTP client for the home-automation hub
pub struct HomeAutomationClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

impl HomeAutomationClient {
    pub fn new(base_url: impl Into<String>, token: Option<SecretString>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Build a client from settings; `None` when no base URL is configured
    pub fn from_settings(settings: &HomeSettings) -> anyhow::Result<Option<Self>> {
        let Some(base_url) = &settings.base_url else {
            return Ok(None);
        };
        let token = match &settings.token_env {
            Some(var) => {
                let value = std::env::var(var)
                    .map_err(|_| anyhow::anyhow!("Environment variable {} not set", var))?;
                Some(SecretString::from(value))
            }
            None => None,
        };
        Self::new(
            base_url.clone(),
            token,
            Duration::from_secs(settings.timeout_seconds),
        )
        .map(Some)
    }

    pub fn function_url(&self, name: &str) -> String {
        format!("{}/functions/{}", self.base_url, name)
    }

    /// Invoke a hub function; a JSON body is returned as-is, any other body as text
    pub async fn call(&self, name: &str, args: &Arguments) -> anyhow::Result<Value> {
        let mut request = self.client.post(self.function_url(name)).json(args);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("{} returned {}: {}", name, status, body);
        }

        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

/// One hub function exposed to the assistant
pub struct RemoteFunction {
    name: String,
    client: Arc<HomeAutomationClient>,
}

impl RemoteFunction {
    pub fn new(name: impl Into<String>, client: Arc<HomeAutomationClient>) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }
}

#[async_trait]
impl HomeFunction for RemoteFunction {
    async fn call(&self, args: Arguments) -> anyhow::Result<Value> {
        tracing::info!(function = %self.name, "Calling hub function");
        self.client.call(&self.name, &args).await
    }
}

/// Register every descriptor as a remote function
pub fn register_remote_functions(
    registry: &mut FunctionRegistry,
    client: Arc<HomeAutomationClient>,
    descriptors: &[ToolDescriptor],
) {
    for descriptor in descriptors {
        registry.register(
            descriptor.name.clone(),
            Arc::new(RemoteFunction::new(descriptor.name.clone(), client.clone())),
        );
    }
}
