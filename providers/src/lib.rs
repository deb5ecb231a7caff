//! The generation collaborator boundary.
//!
//! # Architecture
//!
//! - [`Generator`] - the one capability the engine depends on: a system prompt
//!   and a user prompt in, text out. Object-safe so the engine can hold
//!   `&dyn Generator` and tests can script responses.
//! - [`HttpGenerator`] - a non-streaming implementation over the provider APIs:
//!   - [`claude`] - Anthropic Messages API
//!   - [`openai`] - OpenAI Responses API
//!   - [`gemini`] - Google Gemini generateContent API
//! - [`retry`] - transport retry beneath each HTTP call. Nothing above this
//!   crate retries.
//! - [`response`] - fence stripping and JSON extraction for every response.
//!
//! # Error Handling
//!
//! A call either yields the provider's text or a [`GenerationError`]. A 2xx
//! response without any text block is [`GenerationError::MalformedResponse`];
//! it is never retried, since the same request would most likely produce the
//! same payload.

pub mod claude;
pub mod gemini;
pub mod openai;
pub mod response;
pub mod retry;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;

pub use reverie_types::{ApiKey, Provider};
pub use response::{
    ResponseError, extract_json_object, strip_code_fence, unwrap_json, unwrap_text,
};
pub use retry::RetryConfig;

use retry::RetryOutcome;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Everything one collaborator call needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub max_output_tokens: u32,
}

impl<'a> GenerationRequest<'a> {
    #[must_use]
    pub const fn new(system_prompt: &'a str, user_prompt: &'a str, max_output_tokens: u32) -> Self {
        Self {
            system_prompt,
            user_prompt,
            max_output_tokens,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("{provider} request failed after {attempts} attempt(s): {source}")]
    Transport {
        provider: &'static str,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} returned a malformed response: {reason}")]
    MalformedResponse {
        provider: &'static str,
        reason: String,
    },
    /// Failure raised by a non-HTTP generator.
    #[error("generation failed: {0}")]
    Other(String),
}

pub type GenerateFut<'a> =
    Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;

/// A text-generation collaborator.
pub trait Generator: Send + Sync {
    fn generate<'a>(&'a self, request: GenerationRequest<'a>) -> GenerateFut<'a>;
}

impl<G: Generator + ?Sized> Generator for std::sync::Arc<G> {
    fn generate<'a>(&'a self, request: GenerationRequest<'a>) -> GenerateFut<'a> {
        (**self).generate(request)
    }
}

fn base_client_builder() -> reqwest::ClientBuilder {
    use reqwest::header::{HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        reqwest::header::USER_AGENT,
        HeaderValue::from_static(concat!("reverie/", env!("CARGO_PKG_VERSION"))),
    );

    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers)
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Provider credentials, model and endpoint.
///
/// The provider is taken from the key, so a key can never be sent to another
/// provider's endpoint.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    api_key: ApiKey,
    model: String,
    base_url: Option<String>,
}

impl ApiConfig {
    #[must_use]
    pub fn new(api_key: ApiKey, model: impl Into<String>) -> Self {
        Self {
            api_key,
            model: model.into(),
            base_url: None,
        }
    }

    /// Point requests at another host, e.g. a mock server or a proxy.
    ///
    /// For Claude and OpenAI this is the full endpoint URL; for Gemini it is the
    /// API base (`.../v1beta`).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn provider(&self) -> Provider {
        self.api_key.provider()
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        match self.provider() {
            Provider::Claude => self.base_url.as_deref().unwrap_or(claude::API_URL).to_string(),
            Provider::OpenAI => self.base_url.as_deref().unwrap_or(openai::API_URL).to_string(),
            Provider::Gemini => {
                gemini::endpoint(self.base_url.as_deref().unwrap_or(gemini::API_BASE), &self.model)
            }
        }
    }

    fn allows_plain_http(&self) -> bool {
        self.base_url
            .as_deref()
            .is_some_and(|url| url.starts_with("http://"))
    }
}

/// Non-streaming HTTP generator for Claude, OpenAI and Gemini.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    config: ApiConfig,
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpGenerator {
    /// `timeout` bounds each HTTP attempt, not the whole retried call.
    pub fn new(
        config: ApiConfig,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self, GenerationError> {
        let client = base_client_builder()
            .https_only(!config.allows_plain_http())
            .timeout(timeout)
            .build()
            .map_err(GenerationError::Client)?;
        Ok(Self {
            config,
            client,
            retry,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn call(&self, request: GenerationRequest<'_>) -> Result<String, GenerationError> {
        let provider = self.config.provider();
        let name = provider.display_name();
        let url = self.config.endpoint();
        let key = self.config.api_key.expose_secret();
        let model = self.config.model();

        let body = match provider {
            Provider::Claude => claude::build_body(model, &request),
            Provider::OpenAI => openai::build_body(model, &request),
            Provider::Gemini => gemini::build_body(&request),
        };
        let build = || match provider {
            Provider::Claude => claude::build_request(&self.client, &url, key, &body),
            Provider::OpenAI => openai::build_request(&self.client, &url, key, &body),
            Provider::Gemini => gemini::build_request(&self.client, &url, key, &body),
        };

        tracing::debug!(
            provider = name,
            model,
            max_output_tokens = request.max_output_tokens,
            "Sending generation request"
        );

        let response = match retry::send_with_retry(build, &self.retry).await {
            RetryOutcome::Success(response) => response,
            RetryOutcome::HttpError(response) => {
                let status = response.status().as_u16();
                let body = read_capped_error_body(response).await;
                return Err(GenerationError::Api {
                    provider: name,
                    status,
                    body,
                });
            }
            RetryOutcome::Transport { attempts, source } => {
                return Err(GenerationError::Transport {
                    provider: name,
                    attempts,
                    source,
                });
            }
        };

        let json: serde_json::Value = response.json().await.map_err(|err| {
            GenerationError::MalformedResponse {
                provider: name,
                reason: format!("body is not JSON: {err}"),
            }
        })?;

        let text = match provider {
            Provider::Claude => claude::extract_text(&json),
            Provider::OpenAI => openai::extract_text(&json),
            Provider::Gemini => gemini::extract_text(&json),
        };
        text.ok_or_else(|| GenerationError::MalformedResponse {
            provider: name,
            reason: "no text content in response".to_string(),
        })
    }
}

impl Generator for HttpGenerator {
    fn generate<'a>(&'a self, request: GenerationRequest<'a>) -> GenerateFut<'a> {
        Box::pin(self.call(request))
    }
}
