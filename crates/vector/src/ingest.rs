use rfpmatch_core::{sanitize_metadata, PipelineError, Result};
use rfpmatch_index::RfpRecord;

use crate::embedding::EmbeddingClient;
use crate::index::{VectorIndex, VectorRecord};

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub namespace: String,
    pub batch_size: usize,
}

impl IngestOptions {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// One batch that could not be embedded or upserted. The positions let the
/// caller name exactly which corpus records are missing from the index.
#[derive(Debug)]
pub struct BatchFailure {
    /// 1-based batch number.
    pub batch: usize,
    pub positions: Vec<usize>,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct IngestReport {
    pub upserted: usize,
    pub batches: usize,
    /// Corpus positions skipped for missing or empty descriptions.
    pub skipped: Vec<usize>,
    pub failures: Vec<BatchFailure>,
}

/// Embeds the corpus in fixed-size batches and upserts each batch into the
/// index. Batch boundaries are a performance knob only; every eligible record
/// gets exactly one embedding regardless of placement. A failed batch is
/// recorded in the report and the remaining batches proceed, so one bad
/// remote call never voids the run. The caller always learns which records
/// did not make it into the index.
pub fn ingest_corpus(
    corpus: &[RfpRecord],
    embeddings: &EmbeddingClient,
    index: &dyn VectorIndex,
    options: &IngestOptions,
) -> Result<IngestReport> {
    ingest_corpus_with(corpus, |texts| embeddings.embed_batch(texts), index, options)
}

pub fn ingest_corpus_with(
    corpus: &[RfpRecord],
    mut embed_fn: impl FnMut(&[String]) -> Result<Vec<Vec<f32>>>,
    index: &dyn VectorIndex,
    options: &IngestOptions,
) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    let mut eligible: Vec<(usize, &RfpRecord)> = Vec::new();
    for (position, record) in corpus.iter().enumerate() {
        if record.has_description() {
            eligible.push((position, record));
        } else {
            report.skipped.push(position);
        }
    }
    for (batch_number, batch) in eligible.chunks(options.batch_size.max(1)).enumerate() {
        match ingest_batch(batch, &mut embed_fn, index, &options.namespace) {
            Ok(count) => {
                report.upserted += count;
                report.batches += 1;
            }
            Err(err) => report.failures.push(BatchFailure {
                batch: batch_number + 1,
                positions: batch.iter().map(|(position, _)| *position).collect(),
                error: err.to_string(),
            }),
        }
    }
    Ok(report)
}

fn ingest_batch(
    batch: &[(usize, &RfpRecord)],
    embed_fn: &mut impl FnMut(&[String]) -> Result<Vec<Vec<f32>>>,
    index: &dyn VectorIndex,
    namespace: &str,
) -> Result<usize> {
    let texts: Vec<String> = batch
        .iter()
        .map(|(_, record)| record.description().unwrap_or_default().to_string())
        .collect();
    let vectors = embed_fn(&texts)?;
    if vectors.len() != batch.len() {
        return Err(PipelineError::Embedding(format!(
            "backend returned {} vectors for a batch of {}",
            vectors.len(),
            batch.len()
        )));
    }
    let records: Vec<VectorRecord> = batch
        .iter()
        .zip(vectors)
        .map(|((position, record), values)| VectorRecord {
            id: record.stable_key(*position),
            values,
            metadata: sanitize_metadata(&record.metadata()),
        })
        .collect();
    index.upsert(namespace, &records)?;
    Ok(records.len())
}
