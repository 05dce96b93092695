use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod prompt;
mod session;
mod settings;

use commands::configure::handle_configure;
use settings::Settings;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Model to use (can also be set via PARLEY_MODEL)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Maximum tokens per model reply (can also be set via PARLEY_MAX_TOKENS)
    #[arg(long, global = true)]
    max_tokens: Option<u32>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat (the default)
    Chat,

    /// Send one message and print the reply
    Run {
        /// The message to send
        #[arg(short, long)]
        text: String,
    },

    /// Store API keys for the model and tools in the system keyring
    Configure,
}

fn init_tracing() {
    // Logs go to stderr so they never interleave with streamed replies
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let settings = Settings::new()?.with_overrides(cli.model, cli.max_tokens);

    match cli.command {
        Some(Command::Configure) => handle_configure(&settings).await,
        Some(Command::Run { text }) => commands::session::execute(&settings, Some(&text)).await,
        Some(Command::Chat) | None => commands::session::execute(&settings, None).await,
    }
}
