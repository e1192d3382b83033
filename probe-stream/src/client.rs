//! Ollama API client struct and builder.

use std::time::Duration;

use crate::error::{GenerateError, map_reqwest_error};
use crate::streaming::{EventStream, read_all, read_incremental};
use crate::types::{GenerateOptions, GenerateRequest, GenerateResponse, StreamResult};

/// Default model used when none is configured.
pub const DEFAULT_MODEL: &str = "llama2:7b-chat-q4_0";

/// Default Ollama API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default request-level timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for the Ollama Generate API.
///
/// # Example
///
/// ```no_run
/// use probe_stream::Ollama;
///
/// let client = Ollama::new()
///     .model("llama3.2")
///     .base_url("http://localhost:11434");
/// ```
#[derive(Debug, Clone)]
pub struct Ollama {
    /// Model identifier sent with every request.
    pub(crate) model: String,
    /// API base URL (override for testing or remote Ollama instances).
    pub(crate) base_url: String,
    /// Optional keep_alive duration string (e.g. "5m", "0" to unload).
    pub(crate) keep_alive: Option<String>,
    /// Whole-request timeout, covering the streamed body.
    pub(crate) timeout: Duration,
    /// Shared HTTP client.
    pub(crate) client: reqwest::Client,
}

impl Ollama {
    /// Create a new client with sensible defaults.
    ///
    /// Default model: `llama2:7b-chat-q4_0`.
    /// Default base URL: `http://localhost:11434`.
    /// Default timeout: 120 seconds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            keep_alive: None,
            timeout: DEFAULT_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    /// Override the model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL.
    ///
    /// Useful for testing with a local mock server or a remote Ollama instance.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the keep_alive duration for model memory residency.
    ///
    /// Examples: `"5m"` (keep for 5 minutes), `"0"` (unload immediately after request).
    /// When not set, Ollama uses its server default.
    #[must_use]
    pub fn keep_alive(mut self, duration: impl Into<String>) -> Self {
        self.keep_alive = Some(duration.into());
        self
    }

    /// Override the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The configured model.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    /// Build the generate endpoint URL.
    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, prompt: &str, options: GenerateOptions, stream: bool) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream,
            options: (!options.is_empty()).then_some(options),
            keep_alive: self.keep_alive.clone(),
        }
    }

    async fn send(&self, body: &GenerateRequest) -> Result<reqwest::Response, GenerateError> {
        let url = self.generate_url();
        tracing::debug!(url = %url, model = %body.model, stream = body.stream, "sending generate request to Ollama");

        self.client
            .post(&url)
            .timeout(self.timeout)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(map_reqwest_error)
    }

    /// Generate a complete answer with `stream: false`.
    pub async fn generate(
        &self,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<StreamResult, GenerateError> {
        let body = self.build_request(prompt, options, false);
        let response = self.send(&body).await?;

        let status = response.status();
        let response_text = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            return Err(GenerateError::RequestFailed {
                status: status.as_u16(),
                body: response_text,
            });
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&response_text).map_err(|source| GenerateError::MalformedChunk {
                line: response_text.clone(),
                partial: String::new(),
                source,
            })?;

        tracing::debug!(eval_count = ?parsed.eval_count, "generate request complete");
        Ok(parsed.into())
    }

    /// Open a streaming generation and return the live response.
    ///
    /// The status is not checked here; the reader functions do that.
    pub async fn generate_stream(
        &self,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<reqwest::Response, GenerateError> {
        let body = self.build_request(prompt, options, true);
        self.send(&body).await
    }

    /// Stream a generation and wait for the assembled result.
    pub async fn stream_all(
        &self,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<StreamResult, GenerateError> {
        let response = self.generate_stream(prompt, options).await?;
        read_all(response).await
    }

    /// Stream a generation fragment by fragment.
    pub async fn stream_incremental(
        &self,
        prompt: &str,
        options: GenerateOptions,
    ) -> Result<EventStream, GenerateError> {
        let response = self.generate_stream(prompt, options).await?;
        Ok(Box::pin(read_incremental(response)))
    }
}

impl Default for Ollama {
    fn default() -> Self {
        Self::new()
    }
}
