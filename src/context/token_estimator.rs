//! Heuristic token estimation for conversation budgeting
//!
//! Deterministic and tokenizer-free: two independent estimates are computed
//! and the larger wins. The word/punctuation split undercounts dense text
//! without spaces (long identifiers, CJK), the character heuristic
//! undercounts text made of many short words; max() avoids under-budgeting
//! in either regime. The rescue and threshold logic elsewhere is tuned
//! against this exact combination.

use once_cell::sync::Lazy;
use regex::Regex;

use super::models::Message;

/// Fixed per-message overhead approximating role/delimiter tokens.
pub const MESSAGE_OVERHEAD: usize = 4;

/// One run of word characters, or one non-whitespace symbol.
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w+|[^\w\s]").expect("token pattern"));

/// Return a rough token estimate for a given text.
///
/// Empty or whitespace-only text estimates to 0. Never fails.
pub fn estimate_tokens(text: &str) -> usize {
    let stripped = text.trim();
    if stripped.is_empty() {
        return 0;
    }
    let by_units = TOKEN_PATTERN.find_iter(stripped).count();
    let by_chars = (stripped.chars().count() + 3) / 4;
    by_units.max(by_chars)
}

/// Approximate total tokens for a message sequence, including the
/// per-message overhead. Distinct from the content-only aggregate used by
/// the budget check in [`super::manager::ContextManager`].
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| estimate_tokens(&m.content) + MESSAGE_OVERHEAD)
        .sum()
}

/// Token estimator trait for different estimation strategies
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in the given text
    fn estimate(&self, text: &str) -> usize;

    /// Estimate tokens for multiple texts
    fn estimate_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|t| self.estimate(t)).collect()
    }
}

/// The crate's dual-estimate heuristic behind the estimator seam
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}
