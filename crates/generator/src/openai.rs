use std::time::Duration;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
    tracing::{debug, trace, warn},
    wayfinder_common::{Generator, GeneratorRequest},
    wayfinder_config::{GeneratorConfig, schema::API_KEY_ENV},
};

use crate::error::{Context, Error, Result};

/// Whole-request ceiling for the HTTP client; the session applies its own
/// tighter bound on top.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

/// `{"type": "text", …}` or `{"type": "image_url", …}`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Screenshots arrive as bare base64 PNG; anything already carrying a
/// scheme is passed through.
fn image_data_uri(image: &str) -> String {
    if image.starts_with("data:") || image.starts_with("http://") || image.starts_with("https://")
    {
        image.to_string()
    } else {
        format!("data:image/png;base64,{image}")
    }
}

// ── Generator ───────────────────────────────────────────────────────────────

pub struct OpenAiGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<Secret<String>>,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.resolved_api_key(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request<'a>(&'a self, request: &'a GeneratorRequest) -> ChatRequest<'a> {
        let user = match &request.image {
            Some(image) => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: &request.user,
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_data_uri(image),
                    },
                },
            ]),
            None => MessageContent::Text(&request.user),
        };
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(&request.system),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
        }
    }

    /// Send one chat completion and return the first choice's text.
    pub async fn chat(&self, request: &GeneratorRequest) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(Error::MissingApiKey { env: API_KEY_ENV })?;
        let body = self.build_request(request);

        debug!(
            model = %self.model,
            max_tokens = body.max_tokens,
            with_image = request.image.is_some(),
            "chat completion request"
        );
        trace!(system = %request.system, user = %request.user, "chat completion prompt");

        let http_resp = self
            .client
            .post(self.endpoint())
            .header(
                "Authorization",
                format!("Bearer {}", api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await?;

        let status = http_resp.status();
        let text = http_resp.text().await?;
        if !status.is_success() {
            warn!(status = %status, model = %self.model, "chat completion API error");
            return Err(Error::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        trace!(response = %text, "chat completion raw response");
        let parsed: ChatResponse =
            serde_json::from_str(&text).context("malformed chat completion response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(Error::EmptyResponse)
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: GeneratorRequest) -> wayfinder_common::Result<String> {
        self.chat(&request).await.map_err(Into::into)
    }
}
