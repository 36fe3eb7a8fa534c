//! Deterministic context window management for local LLM chat sessions
//!
//! Every send must fit a fixed token budget, so the crate decides which
//! messages survive into the next model invocation: a tokenizer-free token
//! estimator feeds a context manager that selects recent turns, rescues
//! truncated copies of important ones, and produces extractive summaries —
//! all synchronously, with no model calls. Sessions own the untrimmed
//! history; trimming is a pure computation over a snapshot of it.

pub mod config;
pub mod context;
pub mod error;
pub mod metrics;
pub mod session;
pub mod tracker;

pub use config::{Config, ContextSettings, LoggingSettings};
pub use context::{
    estimate_messages_tokens, estimate_tokens, ContextManager, ContextWindowUsage,
    ExtractiveSummarizer, HeuristicEstimator, Message, Role, SummarizerConfig, TokenEstimator,
};
pub use error::{ContextError, Result};
pub use session::{render_prompt, ChatSession, PreparedRequest};
pub use tracker::{TokenMetrics, TokenTracker};
