use reqwest::blocking::Client;
use serde::Deserialize;

use rfpmatch_core::{
    truncate_to_token_budget, HashEmbedder, HashEmbedderConfig, PipelineError, Result,
    RetryPolicy, EMBED_TOKEN_BUDGET,
};

#[derive(Clone)]
pub enum EmbeddingBackend {
    Hash(HashEmbedder),
    OpenAi(OpenAiEmbeddingClient),
}

/// Maps text to fixed-length vectors. Every input is hard-cut to the token
/// budget before it reaches the backend, so the caller never submits an
/// over-long request. The backend (and its model) must stay fixed between
/// ingestion and querying of a namespace.
#[derive(Clone)]
pub struct EmbeddingClient {
    backend: EmbeddingBackend,
    token_budget: usize,
}

impl EmbeddingClient {
    pub fn hash() -> Self {
        Self {
            backend: EmbeddingBackend::Hash(HashEmbedder::new(HashEmbedderConfig::default())),
            token_budget: EMBED_TOKEN_BUDGET,
        }
    }

    pub fn openai(model: &str, api_key: &str, retry: RetryPolicy) -> Self {
        Self {
            backend: EmbeddingBackend::OpenAi(OpenAiEmbeddingClient::new(model, api_key, retry)),
            token_budget: EMBED_TOKEN_BUDGET,
        }
    }

    pub fn with_token_budget(mut self, budget: usize) -> Self {
        self.token_budget = budget.max(1);
        self
    }

    pub fn model(&self) -> &str {
        match &self.backend {
            EmbeddingBackend::Hash(_) => "hash",
            EmbeddingBackend::OpenAi(client) => client.model(),
        }
    }

    pub fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut prepared = Vec::with_capacity(inputs.len());
        for input in inputs {
            prepared.push(truncate_to_token_budget(input, self.token_budget)?);
        }
        match &self.backend {
            EmbeddingBackend::Hash(embedder) => Ok(prepared
                .iter()
                .map(|text| embedder.embed_text(text))
                .collect()),
            EmbeddingBackend::OpenAi(client) => client.embed_batch(&prepared),
        }
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let inputs = vec![text.to_string()];
        let mut output = self.embed_batch(&inputs)?;
        output
            .pop()
            .ok_or_else(|| PipelineError::Embedding("backend returned no vector".to_string()))
    }
}

#[derive(Clone)]
pub struct OpenAiEmbeddingClient {
    http: Client,
    model: String,
    api_key: String,
    retry: RetryPolicy,
}

impl OpenAiEmbeddingClient {
    pub fn new(model: &str, api_key: &str, retry: RetryPolicy) -> Self {
        Self {
            http: Client::new(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            retry,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        self.retry.run(
            || self.embed_batch_once(inputs),
            |attempt, err| crate::log_retry("embeddings", attempt, err),
        )
    }

    fn embed_batch_once(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = "https://api.openai.com/v1/embeddings";
        let payload = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|err| PipelineError::Embedding(err.to_string()))?;
        if !response.status().is_success() {
            return Err(PipelineError::Embedding(format!(
                "openai embeddings request failed: {}",
                response.status()
            )));
        }
        let parsed: OpenAiEmbeddingResponse = response
            .json()
            .map_err(|err| PipelineError::Embedding(err.to_string()))?;
        Ok(parsed.data.into_iter().map(|data| data.embedding).collect())
    }
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}
