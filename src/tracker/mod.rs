//! Per-chat token usage tracking
//!
//! Estimates token counts for each inference up front, upgrades them with
//! whatever counts the backend prints while streaming, and keeps a running
//! ledger per chat. Reasoning tokens are approximated from response size
//! since local backends rarely report them.

use std::collections::HashMap;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::context::token_estimator::estimate_tokens;

/// Overhead for system prompts and preprocessing, in tokens.
const SYSTEM_OVERHEAD_TOKENS: usize = 100;
/// Cap on carried-forward context when estimating input tokens.
const MAX_CARRIED_CONTEXT_TOKENS: usize = 2048;
/// Exchanges considered when estimating carried context.
const CARRIED_EXCHANGES: usize = 10;

/// Token metrics for a single inference operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetrics {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub reasoning_tokens: usize,
    pub total_tokens: usize,
    pub model_name: Option<String>,
}

impl TokenMetrics {
    /// Create metrics; a zero total is replaced by the sum of the parts.
    pub fn new(
        input_tokens: usize,
        output_tokens: usize,
        reasoning_tokens: usize,
        total_tokens: usize,
        model_name: Option<String>,
    ) -> Self {
        let total_tokens = if total_tokens == 0 {
            input_tokens + output_tokens + reasoning_tokens
        } else {
            total_tokens
        };
        Self {
            input_tokens,
            output_tokens,
            reasoning_tokens,
            total_tokens,
            model_name,
        }
    }
}

/// Which metric a scraped backend output line reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenField {
    Input,
    Output,
    Reasoning,
    Total,
}

/// Ordered (pattern, field) rules for token counts embedded in backend
/// output lines, e.g. "Processed 120 tokens" or "generated 64 tokens".
static OUTPUT_PATTERNS: Lazy<Vec<(Regex, TokenField)>> = Lazy::new(|| {
    [
        (r"(?:input|processed).*?(\d+).*?tokens?", TokenField::Input),
        (r"(?:output|generated).*?(\d+).*?tokens?", TokenField::Output),
        (r"reasoning.*?(\d+).*?tokens?", TokenField::Reasoning),
        (r"total.*?(\d+).*?tokens?", TokenField::Total),
    ]
    .into_iter()
    .map(|(pattern, field)| (Regex::new(pattern).expect("output pattern"), field))
    .collect()
});

/// An inference whose final counts are not in yet
#[derive(Debug, Clone)]
struct PendingRequest {
    chat_id: String,
    input_tokens: usize,
    model_name: Option<String>,
    scraped_input: Option<usize>,
    scraped_output: Option<usize>,
    scraped_reasoning: Option<usize>,
    scraped_total: Option<usize>,
}

/// Track token usage for local inference operations.
///
/// Safe to share across threads; chats are independent entries. No global
/// instance exists: callers own their tracker alongside their sessions.
#[derive(Debug, Default)]
pub struct TokenTracker {
    chat_tokens: DashMap<String, Vec<TokenMetrics>>,
    pending: DashMap<Uuid, PendingRequest>,
}

impl TokenTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking one inference; returns the request handle.
    pub fn start_request(
        &self,
        chat_id: &str,
        user_input: &str,
        model_name: Option<&str>,
    ) -> Uuid {
        let input_tokens = self.estimate_input_tokens(user_input, chat_id);
        let request_id = Uuid::new_v4();

        self.pending.insert(
            request_id,
            PendingRequest {
                chat_id: chat_id.to_string(),
                input_tokens,
                model_name: model_name.map(str::to_string),
                scraped_input: None,
                scraped_output: None,
                scraped_reasoning: None,
                scraped_total: None,
            },
        );

        request_id
    }

    /// Scrape token counts from a raw backend output line.
    ///
    /// Lines without a recognized count are ignored; unknown request ids
    /// are ignored too (the request may already be complete).
    pub fn process_raw_output(&self, request_id: Uuid, raw_line: &str) {
        let Some(mut request) = self.pending.get_mut(&request_id) else {
            return;
        };

        let line = raw_line.to_lowercase();
        for (pattern, field) in OUTPUT_PATTERNS.iter() {
            let Some(capture) = pattern.captures(&line).and_then(|c| c.get(1)) else {
                continue;
            };
            let Ok(count) = capture.as_str().parse::<usize>() else {
                continue;
            };
            match field {
                TokenField::Input => request.scraped_input = Some(count),
                TokenField::Output => request.scraped_output = Some(count),
                TokenField::Reasoning => request.scraped_reasoning = Some(count),
                TokenField::Total => request.scraped_total = Some(count),
            }
        }
    }

    /// Finish tracking and append the final metrics to the chat ledger.
    ///
    /// Scraped counts win over estimates. Returns `None` for an unknown
    /// request id.
    pub fn complete_request(
        &self,
        request_id: Uuid,
        assistant_output: &str,
    ) -> Option<TokenMetrics> {
        let (_, request) = self.pending.remove(&request_id)?;

        let input_tokens = request.scraped_input.unwrap_or(request.input_tokens);
        let output_tokens = request
            .scraped_output
            .unwrap_or_else(|| estimate_tokens(assistant_output));
        let reasoning_tokens = request
            .scraped_reasoning
            .unwrap_or_else(|| estimate_reasoning_tokens(assistant_output));
        let total_tokens = request
            .scraped_total
            .unwrap_or(input_tokens + output_tokens + reasoning_tokens);

        let metrics = TokenMetrics {
            input_tokens,
            output_tokens,
            reasoning_tokens,
            total_tokens,
            model_name: request.model_name,
        };

        debug!(
            "Chat {}: inference used {} tokens ({} in / {} out / {} reasoning)",
            request.chat_id, total_tokens, input_tokens, output_tokens, reasoning_tokens
        );

        self.chat_tokens
            .entry(request.chat_id)
            .or_default()
            .push(metrics.clone());

        Some(metrics)
    }

    /// Total tokens used in a chat session
    pub fn chat_total_tokens(&self, chat_id: &str) -> usize {
        self.chat_tokens
            .get(chat_id)
            .map(|metrics| metrics.iter().map(|m| m.total_tokens).sum())
            .unwrap_or(0)
    }

    /// All token metrics recorded for a chat session
    pub fn chat_metrics(&self, chat_id: &str) -> Vec<TokenMetrics> {
        self.chat_tokens
            .get(chat_id)
            .map(|metrics| metrics.clone())
            .unwrap_or_default()
    }

    /// Total tokens for every tracked chat
    pub fn all_chat_tokens(&self) -> HashMap<String, usize> {
        self.chat_tokens
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().iter().map(|m| m.total_tokens).sum(),
                )
            })
            .collect()
    }

    /// Drop tracking data for one chat, including its pending requests.
    pub fn clear_chat(&self, chat_id: &str) {
        self.chat_tokens.remove(chat_id);
        self.pending.retain(|_, request| request.chat_id != chat_id);
    }

    /// Drop all tracking data.
    pub fn clear_all(&self) {
        self.chat_tokens.clear();
        self.pending.clear();
    }

    /// Estimate input tokens for a request: the prompt itself, a fixed
    /// system overhead, and a slice of recent conversation context.
    fn estimate_input_tokens(&self, user_input: &str, chat_id: &str) -> usize {
        let base_tokens = estimate_tokens(user_input);

        let context_tokens = self
            .chat_tokens
            .get(chat_id)
            .map(|metrics| {
                let recent: usize = metrics
                    .iter()
                    .rev()
                    .take(CARRIED_EXCHANGES)
                    .map(|m| m.input_tokens + m.output_tokens)
                    .sum();
                recent.min(MAX_CARRIED_CONTEXT_TOKENS)
            })
            .unwrap_or(0);

        // Roughly 10% of recent context is carried forward per turn.
        base_tokens + SYSTEM_OVERHEAD_TOKENS + (context_tokens as f64 * 0.1) as usize
    }
}

/// Reasoning-token estimate tiered by response size: simple replies carry
/// little reasoning overhead, long ones considerably more.
fn estimate_reasoning_tokens(assistant_output: &str) -> usize {
    let output_tokens = estimate_tokens(assistant_output);
    if output_tokens < 50 {
        (output_tokens as f64 * 0.1) as usize
    } else if output_tokens < 200 {
        (output_tokens as f64 * 0.25) as usize
    } else {
        (output_tokens as f64 * 0.4) as usize
    }
}
