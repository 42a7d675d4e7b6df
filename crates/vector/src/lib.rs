mod embedding;
mod index;
mod ingest;
mod matcher;

pub use embedding::{EmbeddingBackend, EmbeddingClient, OpenAiEmbeddingClient};
pub use index::{JsonlIndex, MemoryIndex, PineconeIndex, QueryMatch, VectorIndex, VectorRecord};
pub use ingest::{ingest_corpus, ingest_corpus_with, BatchFailure, IngestOptions, IngestReport};
pub use matcher::{aggregate_scores, Matcher};

/// Every spent retry attempt against a remote backend leaves a log line, so
/// throttling is visible even when the call eventually succeeds.
pub(crate) fn log_retry(operation: &str, attempt: u32, error: &rfpmatch_core::PipelineError) {
    eprintln!("{}", retry_log_line(operation, attempt, error));
}

fn retry_log_line(operation: &str, attempt: u32, error: &rfpmatch_core::PipelineError) -> String {
    format!("[rfpmatch::{operation}] attempt {attempt} failed: {error}")
}

#[cfg(test)]
mod tests {
    use super::retry_log_line;
    use rfpmatch_core::PipelineError;

    #[test]
    fn retry_log_names_the_operation_attempt_and_error() {
        let error = PipelineError::Embedding("rate limited".to_string());
        let line = retry_log_line("embeddings", 2, &error);
        assert!(line.contains("embeddings"));
        assert!(line.contains("attempt 2"));
        assert!(line.contains("rate limited"));
    }
}
