//! Structured prompts and the OpenAI-compatible chat completions client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::AiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Ordered chat messages sent to a model in one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    pub messages: Vec<Message>,
}

impl Prompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message {
            role: Role::System,
            content: content.into(),
        });
        self
    }

    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message {
            role: Role::User,
            content: content.into(),
        });
        self
    }
}

/// Decoding parameters for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub seed: Option<u64>,
    /// Ask the model for a JSON object response.
    pub json: bool,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            seed: None,
            json: false,
        }
    }
}

/// A generative text model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn invoke(&self, prompt: &Prompt, options: &SamplingOptions) -> Result<String, AiError>;
}

/// Client for any `/chat/completions` endpoint speaking the OpenAI wire format.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<UsageInfo>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct UsageInfo {
    total_tokens: Option<u32>,
}

impl OpenAiChatClient {
    /// `base_url` should be like `https://api.openai.com/v1` (no trailing slash needed).
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }

    /// Bound every request by `timeout`. Without one a hung endpoint blocks the caller.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, AiError> {
        self.http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    async fn invoke(&self, prompt: &Prompt, options: &SamplingOptions) -> Result<String, AiError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: &prompt.messages,
            temperature: options.temperature,
            seed: options.seed,
            response_format: options.json.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let url = self.endpoint();
        debug!(url = %url, model = %self.model, messages = prompt.messages.len(), "chat completion request");

        let mut builder = self.http.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = resp.json().await?;
        let tokens = completion
            .usage
            .and_then(|u| u.total_tokens)
            .unwrap_or(0);
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AiError::EmptyCompletion)?;

        info!(model = %self.model, tokens, chars = content.len(), "chat completion");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_builder_keeps_order() {
        let prompt = Prompt::new().system("rules").user("context").user("request");
        let roles: Vec<Role> = prompt.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::System, Role::User, Role::User]);
        assert_eq!(prompt.messages[2].content, "request");
    }

    #[test]
    fn request_serializes_optional_fields() {
        let messages = vec![Message {
            role: Role::User,
            content: "hi".into(),
        }];
        let plain = ChatCompletionRequest {
            model: "gpt-4-1106-preview",
            messages: &messages,
            temperature: 0.2,
            seed: None,
            response_format: None,
        };
        let json = serde_json::to_value(&plain).unwrap();
        assert!(json.get("seed").is_none());
        assert!(json.get("response_format").is_none());
        assert_eq!(json["messages"][0]["role"], "user");

        let seeded = ChatCompletionRequest {
            seed: Some(1337),
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
            ..plain
        };
        let json = serde_json::to_value(&seeded).unwrap();
        assert_eq!(json["seed"], 1337);
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn response_without_content_is_empty() {
        let raw = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
        assert!(parsed.usage.is_none());
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = OpenAiChatClient::new("https://api.openai.com/v1/", None, "gpt-4");
        assert_eq!(client.endpoint(), "https://api.openai.com/v1/chat/completions");
    }
}
