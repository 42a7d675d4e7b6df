use std::collections::HashMap;

use parking_lot::RwLock;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use rfpmatch_core::{PipelineError, Result, RetryPolicy};

/// One stored vector: the join key back to the corpus record, the embedding,
/// and the sanitized metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Named-collection vector store: upsert and top-k nearest-neighbor query by
/// cosine similarity. Fewer stored vectors than `top_k` is not an error.
pub trait VectorIndex {
    fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()>;
    fn query(&self, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>>;
}

/// In-process index used for offline runs and tests. Ordering is fully
/// deterministic: descending score, ties broken by vector id.
#[derive(Default)]
pub struct MemoryIndex {
    namespaces: RwLock<HashMap<String, Vec<VectorRecord>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .get(namespace)
            .map(|records| records.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }

    pub fn get(&self, namespace: &str, id: &str) -> Option<VectorRecord> {
        self.namespaces
            .read()
            .get(namespace)
            .and_then(|records| records.iter().find(|record| record.id == id).cloned())
    }
}

impl VectorIndex for MemoryIndex {
    fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        let mut namespaces = self.namespaces.write();
        let stored = namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            match stored.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    fn query(&self, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let namespaces = self.namespaces.read();
        let Some(stored) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<QueryMatch> = stored
            .iter()
            .map(|record| QueryMatch {
                id: record.id.clone(),
                score: cosine_similarity(vector, &record.values),
                metadata: Some(record.metadata.clone()),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Pinecone-style HTTP backend. Calls go through the bounded retry policy;
/// a spent budget surfaces as an `Index` failure.
pub struct PineconeIndex {
    http: Client,
    host: String,
    api_key: String,
    retry: RetryPolicy,
}

impl PineconeIndex {
    pub fn new(host: &str, api_key: &str, retry: RetryPolicy) -> Self {
        Self {
            http: Client::new(),
            host: host.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            retry,
        }
    }
}

impl VectorIndex for PineconeIndex {
    fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let payload = serde_json::json!({
            "vectors": records,
            "namespace": namespace,
        });
        let url = format!("{}/vectors/upsert", self.host);
        self.retry.run(
            || {
                let response = self
                    .http
                    .post(&url)
                    .header("Api-Key", &self.api_key)
                    .json(&payload)
                    .send()
                    .map_err(|err| PipelineError::Index(err.to_string()))?;
                if !response.status().is_success() {
                    return Err(PipelineError::Index(format!(
                        "upsert to namespace {namespace} failed: {}",
                        response.status()
                    )));
                }
                Ok(())
            },
            |attempt, err| crate::log_retry("upsert", attempt, err),
        )
    }

    fn query(&self, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let payload = serde_json::json!({
            "vector": vector,
            "namespace": namespace,
            "topK": top_k,
            "includeMetadata": true,
        });
        let url = format!("{}/query", self.host);
        self.retry.run(
            || {
                let response = self
                    .http
                    .post(&url)
                    .header("Api-Key", &self.api_key)
                    .json(&payload)
                    .send()
                    .map_err(|err| PipelineError::Index(err.to_string()))?;
                if !response.status().is_success() {
                    return Err(PipelineError::Index(format!(
                        "query against namespace {namespace} failed: {}",
                        response.status()
                    )));
                }
                let parsed: PineconeQueryResponse = response
                    .json()
                    .map_err(|err| PipelineError::Index(err.to_string()))?;
                Ok(parsed.matches)
            },
            |attempt, err| crate::log_retry("query", attempt, err),
        )
    }
}

#[derive(Deserialize)]
struct PineconeQueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

/// File-backed index for offline runs: one `<namespace>.jsonl` of
/// `VectorRecord`s per namespace under a root directory. Loaded fully into
/// memory per call; fine at corpus scale (thousands of postings).
pub struct JsonlIndex {
    root: std::path::PathBuf,
}

impl JsonlIndex {
    pub fn open(root: impl Into<std::path::PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn namespace_path(&self, namespace: &str) -> std::path::PathBuf {
        self.root.join(format!("{namespace}.jsonl"))
    }

    fn load(&self, namespace: &str) -> Result<Vec<VectorRecord>> {
        rfpmatch_index::read_jsonl(&self.namespace_path(namespace))
            .map_err(|err| PipelineError::Index(err.to_string()))
    }
}

impl VectorIndex for JsonlIndex {
    fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<()> {
        let mut stored = self.load(namespace)?;
        for record in records {
            match stored.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        let file = std::fs::File::create(self.namespace_path(namespace))?;
        let mut writer = rfpmatch_index::JsonlWriter::new(std::io::BufWriter::new(file));
        for record in &stored {
            writer
                .write_record(record)
                .map_err(|err| PipelineError::Index(err.to_string()))?;
        }
        Ok(())
    }

    fn query(&self, namespace: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let stored = self.load(namespace)?;
        let mut hits: Vec<QueryMatch> = stored
            .iter()
            .map(|record| QueryMatch {
                id: record.id.clone(),
                score: cosine_similarity(vector, &record.values),
                metadata: Some(record.metadata.clone()),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut a_norm = 0.0f32;
    let mut b_norm = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        a_norm += x * x;
        b_norm += y * y;
    }
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm.sqrt() * b_norm.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, values: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values,
            metadata: Map::new(),
        }
    }

    #[test]
    fn query_orders_by_descending_score() {
        let index = MemoryIndex::new();
        index
            .upsert(
                "rfp",
                &[
                    record("a", vec![1.0, 0.0]),
                    record("b", vec![0.0, 1.0]),
                    record("c", vec![0.7, 0.7]),
                ],
            )
            .unwrap();
        let hits = index.query("rfp", &[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = hits.iter().map(|hit| hit.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
    }

    #[test]
    fn small_namespace_returns_what_it_has() {
        let index = MemoryIndex::new();
        index.upsert("rfp", &[record("only", vec![1.0])]).unwrap();
        assert_eq!(index.query("rfp", &[1.0], 10).unwrap().len(), 1);
        assert!(index.query("empty", &[1.0], 10).unwrap().is_empty());
    }

    #[test]
    fn increasing_k_is_a_superset() {
        let index = MemoryIndex::new();
        let records: Vec<VectorRecord> = (0..8)
            .map(|i| record(&format!("v{i}"), vec![i as f32, (8 - i) as f32]))
            .collect();
        index.upsert("rfp", &records).unwrap();
        let small = index.query("rfp", &[1.0, 1.0], 3).unwrap();
        let large = index.query("rfp", &[1.0, 1.0], 6).unwrap();
        for hit in &small {
            assert!(large.iter().any(|other| other.id == hit.id));
        }
    }

    #[test]
    fn upsert_replaces_existing_ids() {
        let index = MemoryIndex::new();
        index.upsert("rfp", &[record("a", vec![1.0, 0.0])]).unwrap();
        index.upsert("rfp", &[record("a", vec![0.0, 1.0])]).unwrap();
        assert_eq!(index.len("rfp"), 1);
        assert_eq!(index.get("rfp", "a").unwrap().values, vec![0.0, 1.0]);
    }

    #[test]
    fn namespaces_are_isolated() {
        let index = MemoryIndex::new();
        index.upsert("one", &[record("a", vec![1.0])]).unwrap();
        assert_eq!(index.len("one"), 1);
        assert!(!index.is_empty("one"));
        assert!(index.is_empty("two"));
    }

    #[test]
    fn jsonl_index_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        {
            let index = JsonlIndex::open(dir.path()).unwrap();
            index.upsert("rfp", &[record("a", vec![1.0, 0.0])]).unwrap();
            index.upsert("rfp", &[record("a", vec![0.0, 1.0])]).unwrap();
        }
        let reopened = JsonlIndex::open(dir.path()).unwrap();
        let hits = reopened.query("rfp", &[0.0, 1.0], 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        let similar = cosine_similarity(&[1.0, 1.0], &[1.0, 1.0]);
        assert!((similar - 1.0).abs() < 1e-6);
    }
}
