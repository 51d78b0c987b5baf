//! Stream a single chat completion from Player2
//!
//! Loads a client configuration, starts health monitoring for the session,
//! prints text deltas as they arrive, and reads "game state" through the
//! dispatcher the way a mod would from a request task.
//!
//! Run with: cargo run --example stream_chat -- rimtalk.yaml "What's for dinner?"
//!
//! The YAML needs at least `api_key: ${PLAYER2_API_KEY}`.

use anyhow::{Context, Result};
use rimtalk_core::config::load_from_yaml;
use rimtalk_core::{CancellationToken, ChatClient, Dispatcher, Role};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().context("usage: stream_chat <config.yaml> [prompt]")?;
    let prompt = args.next().unwrap_or_else(|| "Say hello to the colony.".to_string());

    let config = load_from_yaml(&config_path)
        .with_context(|| format!("failed to load {}", config_path))?;
    let dispatcher = Arc::new(Dispatcher::from_config(&config.dispatcher));
    let client = ChatClient::new(config)?;

    let session = CancellationToken::new();
    client.start_monitoring(&session);

    // Pretend game thread: drains the dispatcher every tick
    let game_session = session.clone();
    let game_dispatcher = Arc::clone(&dispatcher);
    let game = std::thread::spawn(move || {
        while !game_session.is_cancelled() {
            game_dispatcher.drain();
            std::thread::sleep(Duration::from_millis(16));
        }
    });

    let colony = dispatcher
        .enqueue_async(|| "Three colonists, one muffalo, winter is coming.".to_string())
        .await?;

    let instruction = format!("You narrate a RimWorld colony. Colony: {}", colony);
    let turns = vec![(Role::User, prompt)];

    let payload = client
        .send_streaming(
            &instruction,
            &turns,
            |delta: &str| {
                print!("{}", delta);
                let _ = std::io::stdout().flush();
            },
            &session,
        )
        .await?;
    println!();

    match payload {
        Some(payload) => println!("-- {} tokens", payload.token_count),
        None => println!("-- session ended before the response completed"),
    }

    client.stop_monitoring();
    session.cancel();
    let _ = game.join();

    Ok(())
}
