//! Application entry point: terminal cooking assistant.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Build the [`DialogueEngine`]; features with missing credentials are
//!    disabled, not fatal.
//! 4. Spawn the stdin reader, which forwards lines over an `mpsc` channel.
//! 5. Answer each line through [`ChatApp`] until `/quit` or end of input.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use cooking_assistant::{
    app::{ChatApp, ChatCommand},
    config::{AppConfig, AppPaths},
    dialogue::DialogueEngine,
};

fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("cooking assistant starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Engine
    let engine = DialogueEngine::from_config(config);
    let mut app = ChatApp::new(engine, AppPaths::new());

    // 4. stdin reader
    let (line_tx, mut line_rx) = mpsc::channel::<String>(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line_tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("stdin read failed: {e}");
                    break;
                }
            }
        }
    });

    // 5. Chat loop
    for line in app.banner() {
        println!("{line}");
    }
    prompt()?;

    while let Some(line) = line_rx.recv().await {
        if let Some(command) = ChatCommand::parse(&line) {
            let reply = app.handle(command).await;
            for line in &reply.lines {
                println!("{line}");
            }
            if reply.quit {
                break;
            }
        }
        prompt()?;
    }

    log::info!("cooking assistant shutting down");
    Ok(())
}
