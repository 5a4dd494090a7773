use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use villen_player::audio::HeadlessOutput;
use villen_player::client::ReqwestTransport;
use villen_player::config::Config;
use villen_player::context::PlayerContext;
use villen_player::controller::{AppController, Command};
use villen_player::engine::PlaybackEngine;
use villen_player::logging;
use villen_player::model::LocalStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    if let Err(e) = logging::init_logging(&config.log_dir) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== VILLEN player starting ===");

    let transport = Arc::new(ReqwestTransport::new(config.auth_strategy)?);
    let store = LocalStore::load_from_disk(config.state_file());
    let output = Arc::new(HeadlessOutput::new(Some(config.sample_rate)));
    let ctx = PlayerContext::new(config, transport, store)?;

    let engine = PlaybackEngine::new(&ctx, output).await;
    let _output_listener = engine.start_output_listener();
    let _like_sync = ctx.likes.spawn();

    let controller = AppController::new(ctx.clone(), engine);
    let res = run_app(controller).await;

    if let Err(e) = ctx.store.save_to_disk().await {
        tracing::warn!(error = %e, "Could not save player state on exit");
    }
    if let Err(err) = res {
        tracing::error!(error = ?err, "Application error");
        return Err(err);
    }

    tracing::info!("VILLEN player shutting down");
    Ok(())
}

async fn run_app(controller: AppController) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut events = controller.engine().events().subscribe();

    println!("VILLEN player. Type 'help' for commands.");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let command = match Command::parse(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                if command == Command::Quit {
                    break;
                }

                match controller.execute(command).await {
                    Ok(text) if text.is_empty() => {}
                    Ok(text) => println!("{}", text),
                    Err(e) => {
                        tracing::error!(error = %e, "Command failed");
                        println!("{}", AppController::format_error(&e));
                    }
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(text) = AppController::describe_event(&event) {
                        println!("{}", text);
                    }
                }
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Console fell behind events"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}
