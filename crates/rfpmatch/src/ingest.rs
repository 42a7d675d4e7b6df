use std::path::PathBuf;

use anyhow::{Context, Result};

use rfpmatch_index::{read_jsonl_lossy, RfpRecord};
use rfpmatch_vector::{ingest_corpus, IngestOptions};

use crate::config::PipelineConfig;
use crate::logging;

pub fn run(
    corpus: String,
    namespace: String,
    batch_size: usize,
    index_dir: String,
    config: &PipelineConfig,
) -> Result<()> {
    let corpus_path = PathBuf::from(&corpus);
    let (records, malformed): (Vec<RfpRecord>, Vec<usize>) = read_jsonl_lossy(&corpus_path)
        .with_context(|| format!("failed to read corpus from {corpus}"))?;
    for line in &malformed {
        logging::stage("ingest", format!("skipping malformed record at line {line}"));
    }
    logging::info(format!(
        "embedding {} records with {} into namespace '{}'",
        records.len(),
        config.embedding_provider,
        namespace
    ));
    let embeddings = config.embedding_client()?;
    let index = config.vector_index(&index_dir)?;
    let options = IngestOptions::new(&namespace).with_batch_size(batch_size);
    let report = ingest_corpus(&records, &embeddings, index.as_ref(), &options)
        .with_context(|| format!("ingest into namespace '{namespace}' failed"))?;
    for position in &report.skipped {
        logging::stage(
            "ingest",
            format!("record {position} has no description, not indexed"),
        );
    }
    for failure in &report.failures {
        logging::stage(
            "ingest",
            format!(
                "batch {} failed ({} record(s) not indexed): {}",
                failure.batch,
                failure.positions.len(),
                failure.error
            ),
        );
    }
    logging::stage(
        "ingest",
        format!(
            "upserted {} vectors in {} batch(es), {} record(s) skipped, {} batch(es) failed",
            report.upserted,
            report.batches,
            report.skipped.len(),
            report.failures.len()
        ),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rfpmatch_vector::{JsonlIndex, VectorIndex};
    use tempfile::tempdir;

    fn local_config() -> PipelineConfig {
        PipelineConfig {
            embedding_provider: "hash".to_string(),
            embedding_model: "hash".to_string(),
            vector_backend: "jsonl".to_string(),
            llm_provider: rfpmatch_llm::LlmProvider::Local,
            llm_model: "local".to_string(),
            llm_max_tokens: 2000,
            openai_api_key: None,
            anthropic_api_key: None,
            pinecone_api_key: None,
            pinecone_host: None,
            retry: rfpmatch_core::RetryPolicy::new(1, std::time::Duration::ZERO),
        }
    }

    #[test]
    fn ingest_writes_vectors_to_the_index_dir() {
        let dir = tempdir().unwrap();
        let corpus = dir.path().join("corpus.jsonl");
        let index_dir = dir.path().join("index");
        std::fs::write(
            &corpus,
            concat!(
                "{\"postingId\":\"P-0\",\"description\":\"smart meter rollout\"}\n",
                "{\"postingId\":\"P-1\",\"description\":\"transformer replacement\"}\n",
            ),
        )
        .unwrap();
        run(
            corpus.to_string_lossy().into_owned(),
            "rfp".to_string(),
            100,
            index_dir.to_string_lossy().into_owned(),
            &local_config(),
        )
        .unwrap();
        let index = JsonlIndex::open(&index_dir).unwrap();
        let query = rfpmatch_vector::EmbeddingClient::hash()
            .embed("smart meter rollout")
            .unwrap();
        let hits = index.query("rfp", &query, 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "P-0");
    }
}
