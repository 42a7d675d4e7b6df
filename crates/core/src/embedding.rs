use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy)]
pub struct HashEmbedderConfig {
    pub dimensions: usize,
    pub seed: u64,
}

impl Default for HashEmbedderConfig {
    fn default() -> Self {
        Self {
            dimensions: 256,
            seed: 7919,
        }
    }
}

/// Deterministic token-bucket embedder used for offline runs and tests.
/// Vectors are L2-normalized so cosine similarity reduces to a dot product.
/// It stands in for the remote embedding model; the two must never be mixed
/// within one namespace.
#[derive(Clone)]
pub struct HashEmbedder {
    config: HashEmbedderConfig,
}

impl HashEmbedder {
    pub fn new(config: HashEmbedderConfig) -> Self {
        Self { config }
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions.max(1)
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions()];
        for token in text.split_whitespace() {
            let bucket = self.bucket_for(token);
            vector[bucket] += 1.0;
        }
        normalize(&mut vector);
        vector
    }

    fn bucket_for(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        hasher.write_u64(self.config.seed);
        token.to_lowercase().hash(&mut hasher);
        (hasher.finish() as usize) % self.dimensions()
    }
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_vector() {
        let embedder = HashEmbedder::new(HashEmbedderConfig::default());
        let a = embedder.embed_text("smart grid modernization");
        let b = embedder.embed_text("smart grid modernization");
        assert_eq!(a, b);
        assert_eq!(a.len(), 256);
    }

    #[test]
    fn vectors_are_unit_length() {
        let embedder = HashEmbedder::new(HashEmbedderConfig::default());
        let vector = embedder.embed_text("water treatment plant operations");
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_stays_zero() {
        let embedder = HashEmbedder::new(HashEmbedderConfig::default());
        let vector = embedder.embed_text("");
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn shared_vocabulary_scores_higher_than_disjoint() {
        let embedder = HashEmbedder::new(HashEmbedderConfig::default());
        let query = embedder.embed_text("electric utility metering");
        let close = embedder.embed_text("metering for electric utility customers");
        let far = embedder.embed_text("completely unrelated catering services");
        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&query, &close) > dot(&query, &far));
    }
}
