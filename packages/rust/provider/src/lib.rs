//! Text-generation capability and its OpenRouter implementation.
//!
//! The rest of chargen treats generation as a black box:
//! [`TextGenerator::complete`] takes system instructions, a user prompt, a
//! model id and a credential, and returns free text. No retries are made; a
//! failed call surfaces immediately.

mod protocol;

use std::future::Future;
use std::time::Duration;

use chargen_shared::{ChargenError, ProviderConfig, Result};
use reqwest::Client;
use tracing::{debug, info, instrument};

use protocol::{ChatMessage, ChatRequest, ChatResponse, ErrorResponse};

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("chargen/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// One completion request.
#[derive(Debug, Clone, Copy)]
pub struct Completion<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub model: &'a str,
    pub credential: &'a str,
}

/// An opaque text-generation capability.
pub trait TextGenerator: Send + Sync {
    /// Run one completion and return the raw response text.
    fn complete(&self, request: Completion<'_>) -> impl Future<Output = Result<String>> + Send;
}

// ---------------------------------------------------------------------------
// OpenRouter
// ---------------------------------------------------------------------------

/// OpenRouter chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: Client,
    endpoint: String,
    config: ProviderConfig,
}

impl OpenRouterClient {
    /// Build a client from runtime provider config.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChargenError::Network(format!("failed to build HTTP client: {e}")))?;

        let endpoint = format!(
            "{}/chat/completions",
            config.base_url.as_str().trim_end_matches('/')
        );

        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    /// The full chat-completions URL requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TextGenerator for OpenRouterClient {
    #[instrument(skip_all, fields(model = %request.model))]
    async fn complete(&self, request: Completion<'_>) -> Result<String> {
        let body = ChatRequest {
            model: request.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            top_p: 0.95,
            stop: None,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(request.credential)
            .header("HTTP-Referer", &self.config.app_url)
            .header("X-Title", &self.config.app_title)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChargenError::Network(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(ErrorResponse::message)
                .unwrap_or_else(|| format!("provider returned HTTP {status}"));
            return Err(ChargenError::UpstreamGenerationFailure(message));
        }

        let envelope: ChatResponse = response.json().await.map_err(|e| {
            ChargenError::UpstreamGenerationFailure(format!("malformed envelope: {e}"))
        })?;

        let text = envelope.into_text().ok_or_else(|| {
            ChargenError::UpstreamGenerationFailure(
                "malformed envelope: no message content in choices".into(),
            )
        })?;

        debug!(raw = %text, "provider response");
        info!(chars = text.len(), "completion received");
        Ok(text)
    }
}
