//! Context window management with token budget enforcement
//!
//! Two components, consumed leaf-first: a deterministic tokenizer-free
//! token estimator, and a context manager that owns the token budget and
//! the selection/truncation/summarization policy applied to a message
//! history before each model invocation.

pub mod classify;
pub mod manager;
pub mod models;
pub mod summarizer;
pub mod token_estimator;

pub use manager::{ContextManager, MIN_CONTEXT_TOKENS, MIN_RESERVE_TOKENS};
pub use models::{ContextWindowUsage, Message, Role};
pub use summarizer::{ExtractiveSummarizer, SummarizerConfig};
pub use token_estimator::{
    estimate_messages_tokens, estimate_tokens, HeuristicEstimator, TokenEstimator,
    MESSAGE_OVERHEAD,
};
