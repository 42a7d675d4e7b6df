use anyhow::{anyhow, Context, Result};
use reqwest::{header::HeaderValue, Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::runtime::Runtime;
use tokio::time::{sleep, Duration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Local,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Local => "local",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "openai" => Some(LlmProvider::OpenAi),
            "anthropic" => Some(LlmProvider::Anthropic),
            "local" => Some(LlmProvider::Local),
            _ => None,
        }
    }
}

/// Connection parameters built once per run and handed to the client; the
/// client never reads the process environment itself.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
}

impl LlmConfig {
    pub fn local() -> Self {
        Self {
            provider: LlmProvider::Local,
            model: "local".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 2000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: Option<String>,
    pub user: String,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl LlmResponse {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.provider != LlmProvider::Local {
            let key = config
                .api_key
                .as_deref()
                .ok_or_else(|| anyhow!("{} requires an api key", config.provider.as_str()))?;
            validate_api_key(config.provider, key)?;
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("failed to build http client")?;
        Ok(Self { http, config })
    }

    pub fn provider(&self) -> LlmProvider {
        self.config.provider
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub async fn chat(&self, req: &LlmRequest) -> Result<LlmResponse> {
        match self.config.provider {
            LlmProvider::OpenAi => self.chat_openai(req).await,
            LlmProvider::Anthropic => self.chat_anthropic(req).await,
            LlmProvider::Local => Ok(self.chat_local(req)),
        }
    }

    pub fn chat_blocking(&self, req: &LlmRequest) -> Result<LlmResponse> {
        let rt = Runtime::new().context("failed to create tokio runtime")?;
        rt.block_on(self.chat(req))
    }

    async fn chat_openai(&self, req: &LlmRequest) -> Result<LlmResponse> {
        const MAX_RETRIES: usize = 6;
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1");
        let url = format!("{}/chat/completions", base.trim_end_matches('/'));
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let mut messages = Vec::new();
        if let Some(system) = &req.system {
            messages.push(json!({"role": "system", "content": system }));
        }
        messages.push(json!({"role": "user", "content": req.user }));
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
        });
        if let Some(temperature) = req.temperature {
            payload["temperature"] = json!(temperature);
        }
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            let response = match self
                .http
                .post(&url)
                .bearer_auth(api_key)
                .json(&payload)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt > MAX_RETRIES {
                        return Err(err).with_context(|| "openai request failed");
                    }
                    sleep(backoff_delay(attempt, None)).await;
                    continue;
                }
            };
            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                if attempt > MAX_RETRIES {
                    return Err(anyhow!("openai rate limited after {MAX_RETRIES} retries"));
                }
                let wait = backoff_delay(attempt, response.headers().get("retry-after"));
                sleep(wait).await;
                continue;
            }
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(anyhow!(format!(
                    "openai returned error (status {}): {}",
                    status, body
                )));
            }
            let parsed: ChatResponse =
                serde_json::from_str(&body).context("failed to decode openai response")?;
            let text = parsed
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or_else(|| anyhow!("missing text in OpenAI response"))?;
            let usage = parsed.usage.unwrap_or_default();
            return Ok(LlmResponse {
                content: text,
                prompt_tokens: usage.prompt_tokens.unwrap_or(0),
                completion_tokens: usage.completion_tokens.unwrap_or(0),
            });
        }
    }

    async fn chat_anthropic(&self, req: &LlmRequest) -> Result<LlmResponse> {
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let mut payload = json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [ { "role": "user", "content": req.user } ],
        });
        if let Some(system) = &req.system {
            payload["system"] = json!(system);
        }
        if let Some(temperature) = req.temperature {
            payload["temperature"] = json!(temperature);
        }
        let response = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await
            .with_context(|| "anthropic request failed")?
            .error_for_status()
            .context("anthropic returned an error")?
            .json::<AnthropicResponse>()
            .await
            .context("failed to decode anthropic response")?;
        let text = response
            .content
            .into_iter()
            .find_map(|part| part.text)
            .ok_or_else(|| anyhow!("missing text in Anthropic response"))?;
        let usage = response.usage.unwrap_or_default();
        Ok(LlmResponse {
            content: text,
            prompt_tokens: usage.input_tokens.unwrap_or(0),
            completion_tokens: usage.output_tokens.unwrap_or(0),
        })
    }

    fn chat_local(&self, req: &LlmRequest) -> LlmResponse {
        LlmResponse {
            content: synthesize_local_response(req),
            prompt_tokens: 0,
            completion_tokens: 0,
        }
    }
}

fn backoff_delay(attempt: usize, retry_after: Option<&HeaderValue>) -> Duration {
    if let Some(value) = retry_after {
        if let Ok(text) = value.to_str() {
            if let Ok(secs) = text.parse::<u64>() {
                return Duration::from_secs(secs.max(1));
            }
        }
    }
    let capped = attempt.min(6) as u32;
    Duration::from_secs(1u64 << capped)
}

/// Offline stand-in used when no provider is configured. Classification
/// prompts get a keyword-based yes/no; everything else gets a short canned
/// letter built from the prompt.
fn synthesize_local_response(req: &LlmRequest) -> String {
    let system_lower = req
        .system
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    if system_lower.contains("reply with only 'yes' or 'no'") {
        let user_lower = req.user.to_lowercase();
        let is_utility = ["utility", "electric", "water", "gas", "grid", "sewer"]
            .iter()
            .any(|kw| user_lower.contains(kw));
        return if is_utility { "yes" } else { "no" }.to_string();
    }
    let snippet: String = req
        .user
        .split_whitespace()
        .take(40)
        .collect::<Vec<&str>>()
        .join(" ");
    format!(
        "Subject: Response to RFP\n\nDear Recipient,\n\nWe are pleased to submit our response. {}\n\nBest regards,\nAmplytics",
        snippet
    )
}

fn validate_api_key(provider: LlmProvider, value: &str) -> Result<()> {
    match provider {
        LlmProvider::OpenAi if !value.starts_with("sk-") => Err(anyhow!(
            "openai api key must start with 'sk-' (see https://platform.openai.com/)"
        )),
        LlmProvider::Anthropic if !value.starts_with("sk-ant-") => {
            Err(anyhow!("anthropic api key must start with 'sk-ant-'"))
        }
        _ => Ok(()),
    }
}

#[derive(Default, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}

#[derive(Default, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}
