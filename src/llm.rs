//! OpenAI-compatible chat-completions adapter for [`GenerativeService`].

use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ServiceError;
use crate::generator::GenerationRequest;
use crate::traits::GenerativeService;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Request timeout; `None` keeps the HTTP client's default.
    pub timeout_secs: Option<u64>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
            model: "qwen-max-latest".to_string(),
            temperature: 0.3,
            timeout_secs: None,
            api_key_env: "DASHSCOPE_API_KEY".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ChatCompletionsClient {
    config: LlmConfig,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl ChatCompletionsClient {
    pub fn new(config: LlmConfig, api_key: impl Into<String>) -> Result<Self, ServiceError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        let client = builder.build()?;

        Ok(Self {
            config,
            api_key: api_key.into(),
            client,
        })
    }

    /// Reads the API key from the variable named by `config.api_key_env`.
    pub fn from_env(config: LlmConfig) -> Result<Self, ServiceError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| ServiceError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, api_key)
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    pub fn request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [
                {"role": "system", "content": request.system_instruction},
                {"role": "user", "content": request.user_prompt},
            ],
        })
    }
}

impl GenerativeService for ChatCompletionsClient {
    fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        tracing::debug!(
            resident = request.resident_id,
            model = %self.config.model,
            prompt_chars = request.user_prompt.chars().count(),
            "calling chat completions"
        );

        let body: ChatResponse = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json())?;

        extract_content(body)
    }
}

/// Defers [`ChatCompletionsClient::from_env`] until the first cache miss, so a
/// fully cached batch runs without an API key.
pub struct LazyChatClient {
    config: LlmConfig,
    client: RefCell<Option<ChatCompletionsClient>>,
}

impl LazyChatClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            client: RefCell::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.borrow().is_some()
    }
}

impl GenerativeService for LazyChatClient {
    fn generate(&self, request: &GenerationRequest) -> Result<String, ServiceError> {
        let mut slot = self.client.borrow_mut();
        let client = match slot.take() {
            Some(client) => client,
            None => {
                tracing::debug!(api_key_env = %self.config.api_key_env, "building chat completions client");
                ChatCompletionsClient::from_env(self.config.clone())?
            }
        };
        let result = client.generate(request);
        *slot = Some(client);
        result
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// Text of the first choice.
pub fn extract_content(response: ChatResponse) -> Result<String, ServiceError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| ServiceError::MalformedResponse("response has no message content".to_string()))
}
