//! LLM boundary: a single request/response contract over the Anthropic
//! Messages API.

use serde::{Deserialize, Serialize};

use rev_config::LlmConfig;

use crate::error::ReviewError;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// One completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Instructs the model to emit a single JSON object.
    pub json_mode: bool,
}

/// One completion response.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Seam between the orchestrator and the model provider. Tests substitute
/// scripted clients; production uses [`AnthropicClient`].
pub trait LlmClient: Send + Sync {
    fn complete(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<Completion, ReviewError>> + Send;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

const JSON_MODE_SYSTEM: &str =
    "Respond with a single valid JSON object and nothing else. No prose, no code fences.";

/// Anthropic Messages API client.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    timeout_secs: u64,
}

impl AnthropicClient {
    /// Build a client from config and the `ANTHROPIC_API_KEY` environment.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::MissingApiKey`] when the key is absent.
    pub fn from_env(config: &LlmConfig) -> Result<Self, ReviewError> {
        let api_key = LlmConfig::api_key().ok_or(ReviewError::MissingApiKey)?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            timeout_secs: config.timeout_secs,
        })
    }
}

impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ReviewError> {
        let body = MessagesRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.json_mode.then_some(JSON_MODE_SYSTEM),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let send = self
            .http
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send();

        let deadline = std::time::Duration::from_secs(self.timeout_secs);
        let response = tokio::time::timeout(deadline, send)
            .await
            .map_err(|_| ReviewError::LlmTimeout(self.timeout_secs))?
            .map_err(|e| ReviewError::Llm(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ReviewError::Llm(format!("HTTP {status}: {detail}")));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ReviewError::Llm(format!("malformed response: {e}")))?;

        let content = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        Ok(Completion {
            content,
            model: parsed.model,
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
        })
    }
}
