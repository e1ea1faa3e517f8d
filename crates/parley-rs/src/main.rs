//! Console front end: feeds stdin lines to the assistant as one user in one
//! group and prints replies.

use anyhow::Context;
use clap::Parser;
use log::{debug, info, warn};
use parley_rs::config::{LayeredConfigOptions, ParleyConfig};
use parley_rs::core::{Assistant, HandleOutcome};
use parley_rs::protocol::IncomingMessage;
use parley_rs::{ConsoleGateway, init_logging};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Command-line options for the console client.
#[derive(Parser)]
#[command(name = "parley", version)]
struct Cli {
    /// Optional path to a parley.json5 config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// User id attached to console messages
    #[arg(long, default_value = "console")]
    user: String,
    /// Group id attached to console messages
    #[arg(long, default_value = "local")]
    group: String,
    /// Display name shown in /history
    #[arg(long)]
    name: Option<String>,
}

/// Lines starting with this prefix are broadcast instead of dispatched.
const BROADCAST_PREFIX: &str = "!broadcast ";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();
    info!(
        "starting console (config_set={}, user={}, group={})",
        cli.config.is_some(),
        cli.user,
        cli.group
    );
    let cwd = std::env::current_dir().context("cwd")?;
    let mut options = LayeredConfigOptions::new(&cwd);
    if let Some(path) = cli.config.as_ref() {
        info!("adding runtime config layer: {}", path.display());
        options = options.with_runtime_path(path);
    }
    let layered =
        ParleyConfig::load_layered_with_options(options).context("failed to load layered config")?;
    debug!("layered config loaded (layers={})", layered.layers.len());
    let config = layered.config;

    let gateway = Arc::new(ConsoleGateway::stdout(cli.group.clone()));
    let assistant = Assistant::builder(config)
        .gateway(gateway)
        .build()
        .context("failed to build assistant")?;
    assistant.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut next_id: u64 = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if let Some(text) = line.strip_prefix(BROADCAST_PREFIX) {
                    if let Err(err) = assistant.broadcast_text(text).await {
                        warn!("broadcast failed (error={})", err);
                    }
                    continue;
                }
                next_id += 1;
                let outcome = assistant
                    .handle_incoming(IncomingMessage {
                        user_id: cli.user.clone(),
                        group_id: cli.group.clone(),
                        message_id: next_id.to_string(),
                        raw_text: line,
                        sender_name: cli.name.clone(),
                    })
                    .await;
                match outcome {
                    HandleOutcome::Ignored => eprintln!("(not a command, try /menu)"),
                    HandleOutcome::Suppressed => eprintln!("(bot is off)"),
                    _ => {}
                }
            }
        }
    }

    assistant.shutdown().await;
    Ok(())
}
