use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use noscli::config::Config;
use noscli::post::{PostRequest, PostService, read_content};
use noscli::timeline::TimelineService;
use nostr_client::RelayClient;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "noscli", about = "Nostr CLI client", version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream text notes from a relay until interrupted
    Timeline(TimelineArgs),
    /// Publish a text note to a relay
    Post(PostArgs),
}

#[derive(Args, Debug)]
struct TimelineArgs {
    /// Relay URL
    #[arg(long)]
    relay: Option<String>,
}

#[derive(Args, Debug)]
struct PostArgs {
    /// Relay URL
    #[arg(long)]
    relay: Option<String>,

    /// Note text; read from stdin when omitted
    #[arg(short = 'm', long)]
    message: Option<String>,

    /// Event id to reply to
    #[arg(long)]
    reply_to: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load();
    let client = RelayClient::new();

    match cli.command {
        Command::Timeline(args) => {
            let relay = config.resolve_relay(args.relay.as_deref());
            let cancel = CancellationToken::new();
            spawn_interrupt_handler(cancel.clone());

            info!(relay = %relay, "streaming timeline");
            let mut stdout = std::io::stdout();
            TimelineService::new(client)
                .run(&relay, cancel, &mut stdout)
                .await?;
        }
        Command::Post(args) => {
            let relay = config.resolve_relay(args.relay.as_deref());
            let content = read_content(args.message, tokio::io::stdin())
                .await
                .context("read note from stdin")?;

            let request = PostRequest {
                relay,
                content,
                reply_to: args.reply_to,
            };
            let mut stdout = std::io::stdout();
            PostService::new(client).run(&request, &mut stdout).await?;
        }
    }

    Ok(())
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                debug!("interrupt received, shutting down");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for interrupt"),
        }
    });
}

/// Logs go to stderr so stdout carries only command output.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt};
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
