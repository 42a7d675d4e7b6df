use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};

use rfpmatch_core::{PipelineError, RetryPolicy};
use rfpmatch_llm::{LlmClient, LlmConfig, LlmProvider};
use rfpmatch_vector::{EmbeddingClient, JsonlIndex, PineconeIndex, VectorIndex};

/// All connection parameters for one run, resolved once from the environment
/// and handed to the components that need them. Credentials are only
/// required for the backends a command actually uses; a missing one is a
/// fatal configuration failure raised before any remote call.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub embedding_provider: String,
    pub embedding_model: String,
    pub vector_backend: String,
    pub llm_provider: LlmProvider,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub pinecone_api_key: Option<String>,
    pub pinecone_host: Option<String>,
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        let embedding_provider = env::var("RFPMATCH_EMBEDDING_PROVIDER")
            .unwrap_or_else(|_| "hash".to_string())
            .to_lowercase();
        if !matches!(embedding_provider.as_str(), "hash" | "openai") {
            return Err(anyhow!(PipelineError::Configuration(format!(
                "unknown embedding provider {embedding_provider}"
            ))));
        }
        let vector_backend = env::var("RFPMATCH_VECTOR_BACKEND")
            .unwrap_or_else(|_| "jsonl".to_string())
            .to_lowercase();
        if !matches!(vector_backend.as_str(), "jsonl" | "pinecone") {
            return Err(anyhow!(PipelineError::Configuration(format!(
                "unknown vector backend {vector_backend}"
            ))));
        }
        let provider_name =
            env::var("RFPMATCH_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let llm_provider = LlmProvider::from_str(&provider_name).ok_or_else(|| {
            anyhow!(PipelineError::Configuration(format!(
                "unknown llm provider {provider_name}"
            )))
        })?;
        let retry_attempts = env::var("RFPMATCH_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);
        let retry_base_ms = env::var("RFPMATCH_RETRY_BASE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2000);
        Ok(Self {
            embedding_provider,
            embedding_model: env::var("RFPMATCH_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-large".to_string()),
            vector_backend,
            llm_provider,
            llm_model: env::var("RFPMATCH_MODEL")
                .unwrap_or_else(|_| default_model(llm_provider).to_string()),
            llm_max_tokens: env::var("RFPMATCH_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2000),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            pinecone_api_key: env::var("PINECONE_API_KEY").ok(),
            pinecone_host: env::var("PINECONE_INDEX_HOST").ok(),
            retry: RetryPolicy::new(retry_attempts, Duration::from_millis(retry_base_ms)),
        })
    }

    pub fn embedding_client(&self) -> Result<EmbeddingClient> {
        match self.embedding_provider.as_str() {
            "openai" => {
                let api_key = self.openai_api_key.as_deref().ok_or_else(|| {
                    anyhow!(PipelineError::Configuration(
                        "OPENAI_API_KEY is required for openai embeddings".to_string()
                    ))
                })?;
                Ok(EmbeddingClient::openai(
                    &self.embedding_model,
                    api_key,
                    self.retry,
                ))
            }
            _ => Ok(EmbeddingClient::hash()),
        }
    }

    pub fn vector_index(&self, index_dir: &str) -> Result<Box<dyn VectorIndex>> {
        match self.vector_backend.as_str() {
            "pinecone" => {
                let api_key = self.pinecone_api_key.as_deref().ok_or_else(|| {
                    anyhow!(PipelineError::Configuration(
                        "PINECONE_API_KEY is required for the pinecone backend".to_string()
                    ))
                })?;
                let host = self.pinecone_host.as_deref().ok_or_else(|| {
                    anyhow!(PipelineError::Configuration(
                        "PINECONE_INDEX_HOST is required for the pinecone backend".to_string()
                    ))
                })?;
                Ok(Box::new(PineconeIndex::new(host, api_key, self.retry)))
            }
            _ => Ok(Box::new(JsonlIndex::open(index_dir)?)),
        }
    }

    pub fn llm_client(&self) -> Result<LlmClient> {
        let api_key = match self.llm_provider {
            LlmProvider::OpenAi => self.openai_api_key.clone(),
            LlmProvider::Anthropic => self.anthropic_api_key.clone(),
            LlmProvider::Local => None,
        };
        if self.llm_provider != LlmProvider::Local && api_key.is_none() {
            return Err(anyhow!(PipelineError::Configuration(format!(
                "{} api key is not set",
                self.llm_provider.as_str()
            ))));
        }
        LlmClient::new(LlmConfig {
            provider: self.llm_provider,
            model: self.llm_model.clone(),
            api_key,
            base_url: None,
            max_tokens: self.llm_max_tokens,
        })
    }
}

fn default_model(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAi => "gpt-3.5-turbo",
        LlmProvider::Anthropic => "claude-3-5-sonnet",
        LlmProvider::Local => "local",
    }
}
