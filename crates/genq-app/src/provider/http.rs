use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::config::OrchestratorConfig;
use crate::error::ProviderError;
use crate::provider::GenerationProvider;
use crate::provider::schemas::{HistoryItem, HistoryQuery, StatusResponse, SubmitRequest, SubmitResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider client over its REST API.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpProvider {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ProviderError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ProviderError::Transport(format!("invalid provider url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::Transport(format!("provider url {base_url} cannot be a base")));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    pub fn from_config(config: &OrchestratorConfig) -> Result<Self, ProviderError> {
        Self::new(&config.provider_url, config.provider_token.clone())
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in `new`
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body: error_message(&body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

/// Pull a human readable reason out of an error body. Providers usually send
/// `{"error": ..}` or `{"message": ..}`; anything else is passed through.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message", "detail"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    body.trim().to_string()
}

#[async_trait]
impl GenerationProvider for HttpProvider {
    async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, ProviderError> {
        let url = self.endpoint(&["generations", request.generation_type.id()]);
        debug!("submitting {} generation to {url}", request.generation_type);

        let response = self.authorize(self.client.post(url)).json(request).send().await?;
        Self::read_json(response).await
    }

    async fn status(&self, task_id: &str) -> Result<StatusResponse, ProviderError> {
        let url = self.endpoint(&["generations", "tasks", task_id]);
        trace!("polling {url}");

        let response = self.authorize(self.client.get(url)).send().await?;
        Self::read_json(response).await
    }

    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryItem>, ProviderError> {
        let url = self.endpoint(&["generations", "history"]);

        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(context) = &query.context {
            params.push(("context", context.as_str()));
        }
        if let Some(generation_type) = query.generation_type {
            params.push(("type", generation_type.id()));
        }

        let response = self
            .authorize(self.client.get(url))
            .query(&params)
            .send()
            .await?;
        Self::read_json(response).await
    }
}
