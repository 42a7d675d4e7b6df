use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;

use crate::error::{PipelineError, Result};

static TOKENIZER: Lazy<CoreBPE> = Lazy::new(|| tiktoken_rs::cl100k_base().expect("tokenizer"));

/// Maximum number of cl100k tokens a single embedding input may carry. The
/// embedding endpoint rejects anything longer, so inputs are hard-cut to this
/// budget before every call.
pub const EMBED_TOKEN_BUDGET: usize = 8192;

pub fn count_tokens(text: &str) -> usize {
    TOKENIZER.encode_with_special_tokens(text).len()
}

/// Keeps the first `budget` tokens of `text` and discards the rest. Text at
/// or under budget is returned unchanged. The cut happens on the same
/// tokenizer the embedding model uses, so the boundary is meaningful.
pub fn truncate_to_token_budget(text: &str, budget: usize) -> Result<String> {
    let tokens = TOKENIZER.encode_with_special_tokens(text);
    if tokens.len() <= budget {
        return Ok(text.to_string());
    }
    TOKENIZER
        .decode(tokens[..budget].to_vec())
        .map_err(|err| PipelineError::Tokenizer(err.to_string()))
}
