//! Context preparation dry run
//!
//! Reads a JSON message history from a file argument or stdin, applies the
//! configured context window policy, and prints the prepared prompt with
//! usage statistics. No model is invoked.

use std::io::Read;

use anyhow::{Context as _, Result};
use tracing_subscriber::EnvFilter;

use chat_context::{ChatSession, Config, ContextManager, Message};

fn main() -> Result<()> {
    let config = Config::load().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    let input = read_input().context("reading message history")?;
    let history = Message::from_json_history(&input).context("parsing message history")?;

    let mut session = ChatSession::new(ContextManager::from_settings(&config.context));
    for message in history {
        session.push(message);
    }

    let prepared = session.prepare_request();
    let usage = session.usage();

    println!("{}", prepared.prompt);
    println!();
    println!(
        "-- kept {} of {} messages, {} / {} tokens ({:.1}%)",
        prepared.messages.len(),
        session.history().len(),
        usage.used_tokens,
        usage.max_tokens,
        usage.usage_percent
    );

    if session.should_summarize() {
        println!("-- summarization suggested:");
        println!("{}", session.summarize());
    }

    Ok(())
}

fn read_input() -> Result<String> {
    let mut args = std::env::args().skip(1);
    match args.next() {
        Some(path) => {
            std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))
        }
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("reading stdin")?;
            Ok(buffer)
        }
    }
}
