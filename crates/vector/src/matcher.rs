use rfpmatch_core::{PipelineError, ScoreBoard};
use rfpmatch_index::SkillSet;

use crate::embedding::EmbeddingClient;
use crate::index::{QueryMatch, VectorIndex};

/// Answers "given a query text, return the k closest stored documents with
/// scores": truncate, embed, query. No retries here; those live in the
/// provider adapters.
pub struct Matcher<'a> {
    embeddings: &'a EmbeddingClient,
    index: &'a dyn VectorIndex,
}

impl<'a> Matcher<'a> {
    pub fn new(embeddings: &'a EmbeddingClient, index: &'a dyn VectorIndex) -> Self {
        Self { embeddings, index }
    }

    pub fn top_k(
        &self,
        text: &str,
        namespace: &str,
        k: usize,
    ) -> rfpmatch_core::Result<Vec<QueryMatch>> {
        let vector = self.embeddings.embed(text)?;
        self.index.query(namespace, &vector, k)
    }
}

/// Runs every probe against the index and folds the results into the
/// best-score-per-document board. One probe failing does not void the run:
/// the error is handed to `on_probe_error` and the remaining probes proceed.
/// The merge is a max, so probe order never changes the outcome.
pub fn aggregate_scores(
    probes: &[SkillSet],
    matcher: &Matcher,
    namespace: &str,
    k: usize,
    mut on_probe_error: impl FnMut(usize, &PipelineError),
) -> ScoreBoard {
    let mut board = ScoreBoard::new();
    for (probe_index, probe) in probes.iter().enumerate() {
        if probe.text.trim().is_empty() {
            continue;
        }
        match matcher.top_k(&probe.text, namespace, k) {
            Ok(matches) => {
                for hit in matches {
                    board.merge(hit.id, hit.score);
                }
            }
            Err(err) => on_probe_error(probe_index, &err),
        }
    }
    board
}
