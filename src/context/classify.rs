//! Lexical classification rules for selection and summarization
//!
//! The policy is kept data-driven: ordered marker and pattern tables
//! evaluated in sequence, independent of the selection algorithm that
//! consults them.

use once_cell::sync::Lazy;
use regex::Regex;

use super::models::{Message, Role};

/// Cues marking a user message as worth preserving (questions, requests).
const USER_IMPORTANCE_MARKERS: &[&str] = &[
    "?", "how", "what", "why", "when", "where", "can you", "please",
];

/// Cues marking an assistant message as worth preserving (code, structure).
const ASSISTANT_IMPORTANCE_MARKERS: &[&str] = &[
    "```", "def ", "class ", "import ", "function", "method", "1.", "2.", "- ", "* ", "steps:",
    "example:",
];

/// List/enumeration markers shared by importance and reply classification.
const LIST_MARKERS: &[&str] = &["1.", "2.", "- ", "* "];

/// Question forms whose object becomes the summary topic, tried in order.
static TOPIC_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"how (?:do|can|to) (.*?)[?.]",
        r"what (?:is|are) (.*?)[?.]",
        r"why (?:does|is|are) (.*?)[?.]",
        r"explain (.*?)[?.]",
        r"tell me about (.*?)[?.]",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("topic pattern"))
    .collect()
});

/// Alphabetic words of three letters or more, for the topic fallback.
static TOPIC_WORDS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").expect("word pattern"));

/// Whether a message should survive the window on shallow lexical cues alone.
pub fn is_important(message: &Message) -> bool {
    let content = message.content.to_lowercase();
    let markers = match message.role {
        Role::User => USER_IMPORTANCE_MARKERS,
        Role::Assistant => ASSISTANT_IMPORTANCE_MARKERS,
        Role::System => return false,
    };
    markers.iter().any(|marker| content.contains(marker))
}

/// Extract a short topic phrase from a user message.
///
/// Tries the question-form patterns first; a capture of 50+ characters falls
/// through to the next pattern. Falls back to the first three alphabetic
/// words, then to a generic label.
pub fn extract_topic(content: &str) -> String {
    let lowered = content.to_lowercase();
    for pattern in TOPIC_PATTERNS.iter() {
        if let Some(capture) = pattern.captures(&lowered).and_then(|c| c.get(1)) {
            let topic = capture.as_str().trim();
            if topic.chars().count() < 50 {
                return topic.to_string();
            }
        }
    }

    let words: Vec<&str> = TOPIC_WORDS
        .find_iter(content)
        .take(3)
        .map(|m| m.as_str())
        .collect();
    if !words.is_empty() {
        return words.join(" ");
    }

    "general topic".to_string()
}

/// A single reply classification cue; first match wins.
enum Cue {
    Contains(&'static str),
    ContainsAny(&'static [&'static str]),
    LongerThan(usize),
}

const REPLY_RULES: &[(Cue, &str)] = &[
    (Cue::Contains("```"), "code examples"),
    (Cue::ContainsAny(LIST_MARKERS), "step-by-step information"),
    (Cue::LongerThan(500), "detailed information"),
];

/// Classify an assistant reply for the extractive summary.
pub fn classify_reply(content: &str) -> &'static str {
    for (cue, label) in REPLY_RULES {
        let hit = match cue {
            Cue::Contains(needle) => content.contains(needle),
            Cue::ContainsAny(needles) => needles.iter().any(|n| content.contains(n)),
            Cue::LongerThan(chars) => content.chars().count() > *chars,
        };
        if hit {
            return *label;
        }
    }
    "information"
}
