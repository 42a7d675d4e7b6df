use std::collections::BTreeMap;

use rfpmatch_index::RfpRecord;

/// Best similarity observed per document across all probes. The merge is a
/// plain `max`, so the order probes are folded in never changes the result.
#[derive(Debug, Clone, Default)]
pub struct ScoreBoard {
    scores: BTreeMap<String, f32>,
}

impl ScoreBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, key: impl Into<String>, score: f32) {
        let entry = self.scores.entry(key.into()).or_insert(f32::NEG_INFINITY);
        if score > *entry {
            *entry = score;
        }
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.scores.get(key).copied()
    }

    /// Documents never retrieved by any probe rank with score 0.0.
    pub fn score_or_default(&self, key: &str) -> f32 {
        self.get(key).unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.scores.iter().map(|(key, score)| (key.as_str(), *score))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedRfp {
    pub corpus_index: usize,
    pub key: String,
    pub score: f32,
}

/// Orders the full corpus by aggregated score, descending. Ties keep the
/// original corpus order (stable sort), so repeated runs over identical
/// inputs produce identical rankings.
pub fn rank_by_score(corpus: &[RfpRecord], board: &ScoreBoard) -> Vec<RankedRfp> {
    let mut ranked: Vec<RankedRfp> = corpus
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let key = record.stable_key(index);
            let score = board.score_or_default(&key);
            RankedRfp {
                corpus_index: index,
                key,
                score,
            }
        })
        .collect();
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    ranked
}

pub fn top_fraction_count(total: usize, fraction: f64) -> usize {
    if total == 0 || fraction <= 0.0 {
        return 0;
    }
    ((total as f64) * fraction).ceil() as usize
}

pub fn select_top_fraction(
    corpus: &[RfpRecord],
    board: &ScoreBoard,
    fraction: f64,
) -> Vec<RankedRfp> {
    let mut ranked = rank_by_score(corpus, board);
    ranked.truncate(top_fraction_count(corpus.len(), fraction));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn corpus(ids: &[&str]) -> Vec<RfpRecord> {
        ids.iter()
            .map(|id| {
                let mut map = Map::new();
                map.insert("postingId".to_string(), json!(id));
                map.insert("description".to_string(), json!(format!("work for {id}")));
                RfpRecord::new(map)
            })
            .collect()
    }

    #[test]
    fn merge_keeps_the_maximum() {
        let mut board = ScoreBoard::new();
        board.merge("A", 0.3);
        board.merge("A", 0.9);
        board.merge("A", 0.5);
        assert_eq!(board.get("A"), Some(0.9));
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn unretrieved_documents_default_to_zero_and_rank_last() {
        let docs = corpus(&["A", "B", "C"]);
        let mut board = ScoreBoard::new();
        board.merge("A", 0.9);
        board.merge("C", 0.4);
        let ranked = rank_by_score(&docs, &board);
        let keys: Vec<&str> = ranked.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "C", "B"]);
        assert_eq!(ranked[2].score, 0.0);
    }

    #[test]
    fn selection_count_rounds_up() {
        let ids: Vec<String> = (0..37).map(|i| format!("P-{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let docs = corpus(&refs);
        let board = ScoreBoard::new();
        let selected = select_top_fraction(&docs, &board, 0.1);
        assert_eq!(selected.len(), 4);
        assert_eq!(top_fraction_count(0, 0.1), 0);
        assert_eq!(top_fraction_count(10, 0.0), 0);
    }

    #[test]
    fn ties_keep_corpus_order() {
        let docs = corpus(&["X", "Y", "Z"]);
        let mut board = ScoreBoard::new();
        board.merge("X", 0.5);
        board.merge("Y", 0.5);
        board.merge("Z", 0.5);
        let ranked = rank_by_score(&docs, &board);
        let indices: Vec<usize> = ranked.iter().map(|r| r.corpus_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn selection_is_deterministic_across_invocations() {
        let docs = corpus(&["A", "B", "C", "D", "E"]);
        let mut board = ScoreBoard::new();
        board.merge("B", 0.8);
        board.merge("D", 0.8);
        board.merge("A", 0.2);
        let first = select_top_fraction(&docs, &board, 0.5);
        let second = select_top_fraction(&docs, &board, 0.5);
        assert_eq!(first, second);
    }
}
