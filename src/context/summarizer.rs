//! Extractive conversation summarization
//!
//! Produces a short digest of prior turns with no model calls: topics are
//! pulled from user questions, replies are bucketed by their structure.

use serde::{Deserialize, Serialize};

use super::classify;
use super::models::{Message, Role};

/// Thresholds for the extractive summarizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Maximum bullet points in the digest
    pub max_points: usize,
    /// Minimum user message length (chars) worth a bullet
    pub min_user_chars: usize,
    /// Minimum assistant message length (chars) worth a bullet
    pub min_assistant_chars: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_points: 5,
            min_user_chars: 50,
            min_assistant_chars: 100,
        }
    }
}

/// Heuristic digest builder over grouped conversation turns
#[derive(Debug, Clone, Default)]
pub struct ExtractiveSummarizer {
    config: SummarizerConfig,
}

impl ExtractiveSummarizer {
    pub fn new(config: SummarizerConfig) -> Self {
        Self { config }
    }

    /// Summarize prior turns into a compact digest.
    ///
    /// Returns an empty string when no turns exist, and a generic exchange
    /// count when no turn clears the length thresholds.
    pub fn summarize(&self, messages: &[Message]) -> String {
        let turns = group_turns(messages);
        if turns.is_empty() {
            return String::new();
        }

        let mut points = Vec::new();
        for turn in &turns {
            let user_msg = turn.iter().find(|m| m.role == Role::User);
            let assistant_msg = turn.iter().find(|m| m.role == Role::Assistant);

            if let Some(msg) = user_msg {
                if msg.content.chars().count() > self.config.min_user_chars {
                    let topic = classify::extract_topic(&msg.content);
                    points.push(format!("User asked about {}", topic));
                }
            }

            if let Some(msg) = assistant_msg {
                if msg.content.chars().count() > self.config.min_assistant_chars {
                    let info = classify::classify_reply(&msg.content);
                    points.push(format!("Assistant explained {}", info));
                }
            }
        }

        if !points.is_empty() {
            let listed: Vec<String> = points
                .iter()
                .take(self.config.max_points)
                .map(|p| format!("- {}", p))
                .collect();
            return format!("Previous conversation summary:\n{}", listed.join("\n"));
        }

        format!(
            "Previous conversation involved {} exchanges between user and assistant.",
            turns.len()
        )
    }
}

/// Group non-system messages into turns: accumulate until two messages or an
/// assistant reply closes the turn. A trailing unpaired message is dropped.
fn group_turns(messages: &[Message]) -> Vec<Vec<Message>> {
    let mut turns = Vec::new();
    let mut current: Vec<Message> = Vec::new();

    for message in messages {
        if message.role == Role::System {
            continue;
        }
        current.push(message.clone());
        if current.len() >= 2 || message.role == Role::Assistant {
            turns.push(std::mem::take(&mut current));
        }
    }

    turns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_history_empty_summary() {
        let summarizer = ExtractiveSummarizer::default();
        assert_eq!(summarizer.summarize(&[]), "");
    }

    #[test]
    fn test_system_only_history_has_no_turns() {
        let summarizer = ExtractiveSummarizer::default();
        let messages = vec![Message::system("You are helpful")];
        assert_eq!(summarizer.summarize(&messages), "");
    }

    #[test]
    fn test_short_turns_fall_back_to_exchange_count() {
        let summarizer = ExtractiveSummarizer::default();
        let messages = vec![
            Message::user("hi"),
            Message::assistant("hello"),
            Message::user("more"),
            Message::assistant("ok"),
        ];
        assert_eq!(
            summarizer.summarize(&messages),
            "Previous conversation involved 2 exchanges between user and assistant."
        );
    }

    #[test]
    fn test_substantial_turns_produce_points() {
        let summarizer = ExtractiveSummarizer::default();
        let question = "How do lifetimes work with trait bounds in functions?";
        let answer = format!("Here is how that works in practice:\n```rust\nfn f() {{}}\n```\n{}", "x".repeat(80));
        let messages = vec![Message::user(question), Message::assistant(answer)];

        let summary = summarizer.summarize(&messages);
        assert!(summary.starts_with("Previous conversation summary:\n"));
        assert!(summary.contains("- User asked about lifetimes work with trait bounds in functions"));
        assert!(summary.contains("- Assistant explained code examples"));
    }

    #[test]
    fn test_points_capped_at_five() {
        let summarizer = ExtractiveSummarizer::default();
        let mut messages = Vec::new();
        for i in 0..8 {
            messages.push(Message::user(format!(
                "What is the difference between topic {} and the rest of them?",
                i
            )));
            messages.push(Message::assistant("short"));
        }

        let summary = summarizer.summarize(&messages);
        assert_eq!(summary.matches("\n- ").count(), 5);
    }

    #[test]
    fn test_turn_grouping_tolerates_irregular_sequences() {
        let turns = group_turns(&[
            Message::assistant("unprompted"),
            Message::user("a"),
            Message::user("b"),
            Message::user("dangling"),
        ]);
        // Assistant closes a turn alone, two users close one, the last is dropped.
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].len(), 1);
        assert_eq!(turns[1].len(), 2);
    }
}
