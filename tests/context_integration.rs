//! Integration tests for the context window pipeline
//!
//! Exercises the estimator, manager, summarizer, and session together the
//! way a chat client drives them: append to the untrimmed history, prepare
//! a trimmed request before each send.

use chat_context::{
    estimate_tokens, ChatSession, ContextManager, ExtractiveSummarizer, Message, Role,
};

/// A content string estimating to exactly `n` tokens.
fn content_of_tokens(n: usize) -> String {
    vec!["x"; n].join(" ")
}

fn content_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| estimate_tokens(&m.content)).sum()
}

#[test]
fn test_trivially_fitting_history_is_unchanged() {
    let manager = ContextManager::default();
    let messages = vec![Message::system("You are helpful"), Message::user("hi")];
    assert_eq!(manager.truncate_messages(&messages), messages);
}

#[test]
fn test_window_slides_over_long_conversation() {
    let manager = ContextManager::new(1024, 256);
    let mut messages = vec![Message::system("Be brief.")];
    for i in 0..30 {
        messages.push(Message::user(format!("{} {}", i, content_of_tokens(99))));
    }
    messages.push(Message::user("and finally"));

    let result = manager.truncate_messages(&messages);

    // System first, live prompt last, recent turns in between.
    assert_eq!(result[0].content, "Be brief.");
    assert_eq!(result.last().unwrap().content, "and finally");
    let kept: Vec<&Message> = result[1..result.len() - 1].iter().collect();
    assert!(!kept.is_empty());
    assert!(kept.len() < 30);

    // The kept turns are exactly the most recent ones, in order.
    let originals: Vec<&Message> = messages[31 - kept.len()..31].iter().collect();
    assert_eq!(kept, originals);

    // Nothing from the start of the conversation survives.
    assert!(!result.iter().any(|m| m.content.starts_with("0 ")));
}

#[test]
fn test_rescued_question_is_truncated_and_final() {
    let manager = ContextManager::new(1024, 256);
    let mut question =
        String::from("Explain how quicksort handles already sorted input in the worst case.");
    for _ in 0..120 {
        question.push_str(" The recursion depth grows with each unbalanced partition step.");
    }
    let messages = vec![
        Message::assistant("An earlier answer that will not fit either."),
        Message::user(question),
        Message::user("continue"),
    ];

    let result = manager.truncate_messages(&messages);
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].role, Role::User);
    assert!(result[0].content.ends_with("..."));
    assert!(result[0].content.starts_with("Explain how quicksort"));
    assert_eq!(result[1].content, "continue");
}

#[test]
fn test_budget_floor_returns_required_messages_only() {
    let manager = ContextManager::new(1024, 1000);
    let messages = vec![
        Message::system(content_of_tokens(100)),
        Message::user("old question"),
        Message::assistant("old answer"),
        Message::user("the live prompt"),
    ];

    let result = manager.truncate_messages(&messages);
    assert_eq!(result.len(), 2);
    assert_eq!(result[0].role, Role::System);
    assert_eq!(result[1].content, "the live prompt");
}

#[test]
fn test_summary_fallback_and_empty_cases() {
    let manager = ContextManager::default();
    assert_eq!(manager.summarize_context(&[]), "");

    let messages = vec![
        Message::user("hi"),
        Message::assistant("hello"),
        Message::user("ok"),
        Message::assistant("bye"),
    ];
    assert_eq!(
        manager.summarize_context(&messages),
        "Previous conversation involved 2 exchanges between user and assistant."
    );
}

#[test]
fn test_summary_points_from_substantial_turns() {
    let summarizer = ExtractiveSummarizer::default();
    let messages = vec![
        Message::user("What is the difference between a trait and an interface?"),
        Message::assistant(format!("Step by step:\n1. traits\n2. interfaces\n{}", "x".repeat(80))),
    ];

    let summary = summarizer.summarize(&messages);
    assert!(summary.starts_with("Previous conversation summary:"));
    assert!(summary.contains("- User asked about"));
    assert!(summary.contains("- Assistant explained step-by-step information"));
}

#[test]
fn test_session_flow_preserves_untrimmed_history() {
    let mut session = ChatSession::with_system_prompt(
        ContextManager::new(1024, 256),
        "You are a terse assistant.",
    );

    for i in 0..40 {
        session.push_user(format!("turn {} {}", i, content_of_tokens(60)));
        session.push_assistant(content_of_tokens(60));
    }
    session.push_user("last question");

    let prepared = session.prepare_request();
    assert_eq!(session.history().len(), 82);
    assert!(prepared.messages.len() < session.history().len());
    assert_eq!(prepared.messages[0].role, Role::System);
    assert_eq!(prepared.messages.last().unwrap().content, "last question");
    assert!(prepared.prompt.ends_with("Assistant:"));

    // The backend reply flows into the same untrimmed history.
    session.push_assistant("done");
    assert_eq!(session.history().len(), 83);
}

#[test]
fn test_runtime_knob_updates_recompute_available() {
    let mut manager = ContextManager::new(2048, 512);
    assert_eq!(manager.available_tokens(), 1536);

    manager.set_max_tokens(4096);
    assert_eq!(manager.available_tokens(), 3584);

    manager.set_reserve_tokens(1024);
    assert_eq!(manager.available_tokens(), 3072);

    manager.set_max_tokens(0);
    assert_eq!(manager.max_tokens(), 1024);
    manager.set_reserve_tokens(1);
    assert_eq!(manager.reserve_tokens(), 256);
}

mod properties {
    use super::*;
    use proptest::prelude::*;

    /// Histories whose contents cannot form any importance marker, so no
    /// rescue fires and the strict budget bound holds.
    fn neutral_history() -> impl Strategy<Value = Vec<Message>> {
        proptest::collection::vec((0u8..3, "[dkmz ]{0,120}"), 0..25).prop_map(|items| {
            items
                .into_iter()
                .map(|(role, content)| match role {
                    0 => Message::system(content),
                    1 => Message::user(content),
                    _ => Message::assistant(content),
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn truncation_respects_the_budget(
            messages in neutral_history(),
            max_tokens in 1024usize..4096,
            reserve_tokens in 256usize..1024,
        ) {
            let manager = ContextManager::new(max_tokens, reserve_tokens);
            let result = manager.truncate_messages(&messages);

            let system: Vec<&Message> =
                messages.iter().filter(|m| m.role == Role::System).collect();
            let others: Vec<&Message> =
                messages.iter().filter(|m| m.role != Role::System).collect();

            match others.split_last() {
                None => {
                    // Only system messages to keep.
                    prop_assert_eq!(result.len(), system.len());
                }
                Some((last, _)) => {
                    let required = content_tokens(
                        &system.iter().map(|m| (*m).clone()).collect::<Vec<_>>(),
                    ) + estimate_tokens(&last.content);

                    if required >= manager.available_tokens() {
                        // Floor: system + live prompt exactly.
                        prop_assert_eq!(result.len(), system.len() + 1);
                    } else {
                        prop_assert!(content_tokens(&result) <= manager.available_tokens());
                    }
                    prop_assert_eq!(&result.last().unwrap().content, &last.content);
                }
            }
        }

        #[test]
        fn system_messages_survive_in_order(messages in neutral_history()) {
            let manager = ContextManager::default();
            let result = manager.truncate_messages(&messages);

            let system_in: Vec<&str> = messages
                .iter()
                .filter(|m| m.role == Role::System)
                .map(|m| m.content.as_str())
                .collect();
            let system_out: Vec<&str> = result
                .iter()
                .filter(|m| m.role == Role::System)
                .map(|m| m.content.as_str())
                .collect();
            prop_assert_eq!(system_in, system_out);
        }

        #[test]
        fn truncation_is_idempotent(
            messages in neutral_history(),
            max_tokens in 1024usize..4096,
            reserve_tokens in 256usize..1024,
        ) {
            let manager = ContextManager::new(max_tokens, reserve_tokens);
            let once = manager.truncate_messages(&messages);
            let twice = manager.truncate_messages(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn estimator_is_deterministic_and_nonnegative(text in ".{0,200}") {
            let first = estimate_tokens(&text);
            let second = estimate_tokens(&text);
            prop_assert_eq!(first, second);
            if text.trim().is_empty() {
                prop_assert_eq!(first, 0);
            }
        }

        #[test]
        fn selected_history_keeps_chronological_order(messages in neutral_history()) {
            let manager = ContextManager::new(1024, 256);
            let result = manager.truncate_messages(&messages);

            // Every output message appears in the input, and their input
            // positions are strictly increasing.
            let mut cursor = 0usize;
            for kept in &result {
                let found = messages[cursor..]
                    .iter()
                    .position(|m| m == kept)
                    .map(|offset| cursor + offset);
                prop_assert!(found.is_some());
                cursor = found.unwrap() + 1;
            }
        }
    }
}
