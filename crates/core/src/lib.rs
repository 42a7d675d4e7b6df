mod embedding;
mod error;
mod prepare;
mod retry;
mod sanitize;
mod score;

pub use embedding::{HashEmbedder, HashEmbedderConfig};
pub use error::{PipelineError, Result};
pub use prepare::{count_tokens, truncate_to_token_budget, EMBED_TOKEN_BUDGET};
pub use retry::RetryPolicy;
pub use sanitize::sanitize_metadata;
pub use score::{
    rank_by_score, select_top_fraction, top_fraction_count, RankedRfp, ScoreBoard,
};
