//! Context window management for conversation handling
//!
//! Keeps a conversation within token limits using a sliding window over
//! recent turns. System messages and the live prompt always survive; one
//! "rescue" slot admits a truncated copy of an important message that
//! narrowly misses the budget.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::classify;
use super::models::{ContextWindowUsage, Message, Role};
use super::summarizer::{ExtractiveSummarizer, SummarizerConfig};
use super::token_estimator::{estimate_messages_tokens, estimate_tokens};
use crate::config::ContextSettings;

/// Floor for the total context window, in tokens.
pub const MIN_CONTEXT_TOKENS: usize = 1024;
/// Floor for the response reserve, in tokens.
pub const MIN_RESERVE_TOKENS: usize = 256;

/// Smallest leftover budget worth a rescue truncation.
const RESCUE_MIN_BUDGET: usize = 50;
/// Rescue eligibility: at most this many messages already selected.
const RESCUE_MAX_SELECTED: usize = 2;
/// Window fraction past which summarization is suggested.
const SUMMARIZE_THRESHOLD: f64 = 0.7;

/// Sentence-ending punctuation, one or more in a row.
static SENTENCE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+").expect("sentence pattern"));

/// Manage conversation context within token limits.
///
/// Holds no message data between calls; every operation is a fresh
/// computation over the caller-supplied history snapshot.
#[derive(Debug, Clone)]
pub struct ContextManager {
    max_tokens: usize,
    reserve_tokens: usize,
    available_tokens: usize,
    summarizer: ExtractiveSummarizer,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new(4096, 512)
    }
}

impl ContextManager {
    /// Create a manager with the given window size and response reserve.
    ///
    /// Both knobs are clamped to their floors rather than rejected.
    pub fn new(max_tokens: usize, reserve_tokens: usize) -> Self {
        let max_tokens = max_tokens.max(MIN_CONTEXT_TOKENS);
        let reserve_tokens = reserve_tokens.max(MIN_RESERVE_TOKENS);
        Self {
            max_tokens,
            reserve_tokens,
            available_tokens: max_tokens.saturating_sub(reserve_tokens),
            summarizer: ExtractiveSummarizer::default(),
        }
    }

    /// Create a manager from loaded configuration
    pub fn from_settings(settings: &ContextSettings) -> Self {
        Self::new(settings.max_tokens, settings.reserve_tokens)
    }

    /// Replace the summarizer thresholds
    pub fn with_summarizer_config(mut self, config: SummarizerConfig) -> Self {
        self.summarizer = ExtractiveSummarizer::new(config);
        self
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn reserve_tokens(&self) -> usize {
        self.reserve_tokens
    }

    /// Tokens available for the prompt after the response reserve
    pub fn available_tokens(&self) -> usize {
        self.available_tokens
    }

    /// Update the window size, clamped to the floor.
    pub fn set_max_tokens(&mut self, max_tokens: usize) {
        self.max_tokens = max_tokens.max(MIN_CONTEXT_TOKENS);
        self.available_tokens = self.max_tokens.saturating_sub(self.reserve_tokens);
    }

    /// Update the response reserve, clamped to the floor.
    pub fn set_reserve_tokens(&mut self, reserve_tokens: usize) {
        self.reserve_tokens = reserve_tokens.max(MIN_RESERVE_TOKENS);
        self.available_tokens = self.max_tokens.saturating_sub(self.reserve_tokens);
    }

    /// Truncate a message history to fit within the context window.
    ///
    /// System messages and the final non-system message (the live prompt)
    /// are always kept, even when they alone exceed the budget; prior turns
    /// are selected newest-first within whatever budget remains. The input
    /// is never modified.
    pub fn truncate_messages(&self, messages: &[Message]) -> Vec<Message> {
        if messages.is_empty() {
            return Vec::new();
        }

        let system_messages: Vec<Message> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .cloned()
            .collect();
        let other_messages: Vec<&Message> =
            messages.iter().filter(|m| m.role != Role::System).collect();

        let Some((&last_message, conversation_messages)) = other_messages.split_last() else {
            return system_messages;
        };

        let system_tokens: usize = system_messages
            .iter()
            .map(|m| estimate_tokens(&m.content))
            .sum();
        let required_tokens = system_tokens + estimate_tokens(&last_message.content);

        let mut result = system_messages;
        if required_tokens >= self.available_tokens {
            // Hard floor: system context and the live prompt are never
            // dropped, even over budget.
            warn!(
                "Context floor reached: required {} tokens of {} available, dropping all history",
                required_tokens, self.available_tokens
            );
            result.push(last_message.clone());
            return result;
        }

        let available_for_history = self.available_tokens - required_tokens;
        let selected =
            self.select_conversation_history(conversation_messages, available_for_history);
        debug!(
            "Selected {} of {} history messages within {} tokens",
            selected.len(),
            conversation_messages.len(),
            available_for_history
        );

        result.extend(selected);
        result.push(last_message.clone());
        result
    }

    /// Select prior turns within a token budget, scanning newest to oldest.
    ///
    /// The first message that does not fit ends the scan; an important one
    /// gets a single shot at a truncated copy when the window has kept
    /// fewer than two messages and usable headroom remains.
    fn select_conversation_history(
        &self,
        messages: &[&Message],
        token_budget: usize,
    ) -> Vec<Message> {
        let mut selected: Vec<Message> = Vec::new();
        let mut current_tokens = 0usize;

        for message in messages.iter().rev() {
            let msg_tokens = estimate_tokens(&message.content);
            if current_tokens + msg_tokens <= token_budget {
                selected.push((*message).clone());
                current_tokens += msg_tokens;
                continue;
            }

            if classify::is_important(message) && selected.len() < RESCUE_MAX_SELECTED {
                let remaining_budget = token_budget - current_tokens;
                if remaining_budget > RESCUE_MIN_BUDGET {
                    let truncated_content = truncate_content(&message.content, remaining_budget);
                    if !truncated_content.is_empty() {
                        let mut truncated = (*message).clone();
                        truncated.content = truncated_content;
                        selected.push(truncated);
                        debug!(
                            "Rescued important message into {} remaining tokens",
                            remaining_budget
                        );
                    }
                }
            }
            break;
        }

        selected.reverse();
        selected
    }

    /// Whether the history has grown enough to be worth summarizing.
    ///
    /// Uses the overhead-inclusive aggregate, unlike the content-only
    /// accounting of the budget check.
    pub fn should_summarize(&self, messages: &[Message]) -> bool {
        let total_tokens = estimate_messages_tokens(messages);
        total_tokens as f64 > self.max_tokens as f64 * SUMMARIZE_THRESHOLD
    }

    /// Build an extractive digest of older turns.
    pub fn summarize_context(&self, messages: &[Message]) -> String {
        if messages.is_empty() {
            return String::new();
        }
        self.summarizer.summarize(messages)
    }

    /// Content-only token total, without per-message overhead.
    pub fn estimate_total_tokens(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| estimate_tokens(&m.content)).sum()
    }

    /// Context window usage statistics for a history snapshot
    pub fn context_window_usage(&self, messages: &[Message]) -> ContextWindowUsage {
        let used_tokens = self.estimate_total_tokens(messages);
        ContextWindowUsage {
            used_tokens,
            max_tokens: self.max_tokens,
            usage_percent: used_tokens as f64 / self.max_tokens as f64 * 100.0,
        }
    }
}

/// Truncate content to fit a token budget, preferring sentence boundaries.
///
/// Falls back to a character cut at three characters per token, biased
/// short of the estimator's own four-per-token heuristic to leave headroom.
fn truncate_content(content: &str, max_tokens: usize) -> String {
    if estimate_tokens(content) <= max_tokens {
        return content.to_string();
    }

    let sentences: Vec<&str> = SENTENCE_BOUNDARY.split(content).collect();
    if sentences.len() > 1 {
        let mut truncated = String::new();
        for sentence in &sentences {
            let mut candidate = truncated.clone();
            candidate.push_str(sentence);
            candidate.push('.');
            if estimate_tokens(&candidate) <= max_tokens {
                truncated = candidate;
            } else {
                break;
            }
        }
        if !truncated.is_empty() {
            truncated.push_str("...");
            return truncated;
        }
    }

    let max_chars = max_tokens * 3;
    if content.chars().count() > max_chars {
        let cut: String = content.chars().take(max_chars).collect();
        return format!("{}...", cut);
    }

    content.to_string()
}
