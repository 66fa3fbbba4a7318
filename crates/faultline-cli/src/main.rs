//! Faultline CLI
//!
//! Sends messages, errors and cron check-ins through the SDK pipeline, or prints the
//! envelope an event would be sent as.

mod commands;

use clap::{Parser, Subcommand};
use commands::{CheckInCommand, PrintEnvelopeCommand, SendErrorCommand, SendMessageCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "FAULTLINE_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(
        long,
        default_value = "compact",
        env = "FAULTLINE_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a message event
    SendMessage(SendMessageCommand),
    /// Capture an error with an optional chain of causes
    SendError(SendErrorCommand),
    /// Send a cron monitor check-in
    CheckIn(CheckInCommand),
    /// Print the envelope of a message event without sending it
    PrintEnvelope(PrintEnvelopeCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG takes over completely when set
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()?
    } else {
        tracing_subscriber::EnvFilter::try_new(format!(
            "faultline={level},\
             faultline_cli={level},\
             faultline_core={level},\
             faultline_transport={level},\
             faultline_types={level},\
             h2=warn,\
             hyper=warn,\
             reqwest=warn,\
             rustls=warn",
            level = cli.log_level
        ))?
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::SendMessage(cmd) => cmd.execute(),
        Commands::SendError(cmd) => cmd.execute(),
        Commands::CheckIn(cmd) => cmd.execute(),
        Commands::PrintEnvelope(cmd) => cmd.execute(),
    }
}
