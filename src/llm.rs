use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_VISION_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Groq,
    OpenRouter,
    OpenAI,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Groq => "groq",
            LlmProvider::OpenRouter => "openrouter",
            LlmProvider::OpenAI => "openai",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LlmProvider::Groq => GROQ_URL,
            LlmProvider::OpenRouter => OPENROUTER_URL,
            LlmProvider::OpenAI => OPENAI_URL,
        }
    }

    pub fn key_var(&self) -> &'static str {
        match self {
            LlmProvider::Groq => "GROQ_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(LlmProvider::Groq),
            "openrouter" => Ok(LlmProvider::OpenRouter),
            "openai" => Ok(LlmProvider::OpenAI),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

/// Image attached to a completion request (vision models only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub image: Option<ImagePayload>,
}

impl CompletionOptions {
    pub fn with_image(mut self, image: ImagePayload) -> Self {
        self.image = Some(image);
        self
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model returned an empty completion")]
    EmptyCompletion,
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
}

/// The single external collaborator: one prompt in, raw completion text out.
///
/// Calls are never retried here; a failure is reported to the caller as-is.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        options: CompletionOptions,
    ) -> Result<String, GatewayError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

fn build_messages(system: &str, user: &str, image: Option<&ImagePayload>) -> Vec<ChatMessage> {
    let user_content = match image {
        None => MessageContent::Text(user.to_string()),
        Some(image) => MessageContent::Parts(vec![
            ContentPart::Text {
                text: user.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image.data_url(),
                },
            },
        ]),
    };

    vec![
        ChatMessage {
            role: "system".into(),
            content: MessageContent::Text(system.to_string()),
        },
        ChatMessage {
            role: "user".into(),
            content: user_content,
        },
    ]
}

/// OpenAI-compatible chat-completions client (Groq, OpenRouter, OpenAI).
pub struct ChatGateway {
    client: reqwest::Client,
    provider: LlmProvider,
    endpoint: Url,
    api_key: String,
    model: String,
    vision_model: String,
}

impl ChatGateway {
    pub fn new(
        provider: LlmProvider,
        api_key: String,
        model: String,
        vision_model: String,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let endpoint = resolve_endpoint(provider, base_url)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            provider,
            endpoint,
            api_key,
            model,
            vision_model,
        })
    }
}

/// A configured base URL like `https://host/openai/v1` gets
/// `chat/completions` appended; without one the provider default is used.
fn resolve_endpoint(provider: LlmProvider, base_url: Option<&str>) -> Result<Url, GatewayError> {
    let raw = match base_url.map(str::trim).filter(|s| !s.is_empty()) {
        Some(base) if base.ends_with("/chat/completions") => base.to_string(),
        Some(base) => format!("{}/chat/completions", base.trim_end_matches('/')),
        None => provider.default_endpoint().to_string(),
    };
    let url = Url::parse(&raw).map_err(|e| GatewayError::Endpoint(format!("{}: {}", raw, e)))?;
    if url.scheme() != "https" && url.host_str() != Some("localhost") {
        return Err(GatewayError::Endpoint(format!("{} must use https", raw)));
    }
    Ok(url)
}

#[async_trait]
impl ModelGateway for ChatGateway {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        options: CompletionOptions,
    ) -> Result<String, GatewayError> {
        let model = if options.image.is_some() {
            self.vision_model.clone()
        } else {
            self.model.clone()
        };

        let request = ChatRequest {
            model,
            messages: build_messages(system, user, options.image.as_ref()),
            stream: false,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };

        tracing::debug!(
            provider = self.provider.as_str(),
            model = %request.model,
            prompt_chars = user.chars().count(),
            with_image = options.image.is_some(),
            "sending completion request"
        );

        let mut req = self
            .client
            .post(self.endpoint.clone())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request);

        if self.provider == LlmProvider::OpenRouter {
            req = req.header("X-Title", "textguard");
        }

        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Status { status, body });
        }

        let parsed: ChatResponse = response.json().await?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(GatewayError::EmptyCompletion);
        }

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_request_uses_plain_string_content() {
        let req = ChatRequest {
            model: "m".into(),
            messages: build_messages("sys", "hi", None),
            stream: false,
            temperature: 0.1,
            max_tokens: 800,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "hi");
        assert_eq!(v["max_tokens"], 800);
    }

    #[test]
    fn image_payload_becomes_data_url_part() {
        let image = ImagePayload {
            mime: "image/png".into(),
            bytes: vec![1, 2, 3],
        };
        let messages = build_messages("sys", "read this", Some(&image));
        let v = serde_json::to_value(&messages).unwrap();
        let parts = &v[1]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AQID");
    }

    #[test]
    fn endpoint_defaults_and_overrides() {
        let url = resolve_endpoint(LlmProvider::Groq, None).unwrap();
        assert_eq!(url.as_str(), GROQ_URL);

        let url = resolve_endpoint(LlmProvider::OpenAI, Some("https://proxy.example/v1/")).unwrap();
        assert_eq!(url.as_str(), "https://proxy.example/v1/chat/completions");

        assert!(resolve_endpoint(LlmProvider::OpenAI, Some("http://proxy.example/v1")).is_err());
        assert!(resolve_endpoint(LlmProvider::OpenAI, Some("not a url")).is_err());
    }

    #[test]
    fn parses_provider_names() {
        assert_eq!("Groq".parse::<LlmProvider>(), Ok(LlmProvider::Groq));
        assert!("anthropic".parse::<LlmProvider>().is_err());
    }
}
