use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use leadchat_cli::cli::{resolve_config, run_command, CliCommand};
use leadchat_core::store::{SortDirection, SortField};
use leadchat_core::tracing_setup::init_tracing_with_default;
use leadchat_core::ChatRuntime;

#[derive(Parser)]
#[command(name = "leadchat-cli")]
#[command(about = "Command-line console for the admissions WhatsApp inbox")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (apiBaseUrl, apiToken, role, countryCode, ...)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every tab with its conversation count
    Tabs,

    /// List conversations of one tab
    Conversations {
        /// Tab index (0 = Non-Leads)
        #[arg(long, short = 't', default_value_t = 0)]
        tab: usize,
        /// Free-text search over name, phone and last message ('+' joins terms)
        #[arg(long, short = 's')]
        search: Option<String>,
        /// Sort field: last_message_time, name, message_count, created_at
        #[arg(long, default_value = "last_message_time", value_parser = parse_sort)]
        sort: SortField,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        /// Load every page instead of just the first
        #[arg(long)]
        all: bool,
    },

    /// Print the transcript of a conversation
    Messages {
        phone: String,
    },

    /// Send a WhatsApp message
    Send {
        phone: String,
        /// Message content
        content: String,
    },

    /// Delete all messages of a conversation
    Clear {
        phone: String,
    },

    /// Delete a conversation
    Delete {
        phone: String,
    },

    /// Enable or disable the AI assistant for a conversation
    Ai {
        phone: String,
        #[arg(long, action = clap::ArgAction::Set)]
        enabled: bool,
    },

    /// Follow live updates and print one JSON line per change
    Watch {
        #[arg(long, short = 't', default_value_t = 0)]
        tab: usize,
    },
}

fn parse_sort(value: &str) -> Result<SortField, String> {
    SortField::parse(value).ok_or_else(|| format!("unknown sort field: {}", value))
}

impl From<Commands> for CliCommand {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Tabs => CliCommand::Tabs,
            Commands::Conversations {
                tab,
                search,
                sort,
                desc,
                all,
            } => CliCommand::Conversations {
                tab,
                search,
                sort,
                direction: if desc {
                    SortDirection::Descending
                } else {
                    SortDirection::Ascending
                },
                all,
            },
            Commands::Messages { phone } => CliCommand::Messages { phone },
            Commands::Send { phone, content } => CliCommand::Send { phone, content },
            Commands::Clear { phone } => CliCommand::Clear { phone },
            Commands::Delete { phone } => CliCommand::Delete { phone },
            Commands::Ai { phone, enabled } => CliCommand::Ai { phone, enabled },
            Commands::Watch { tab } => CliCommand::Watch { tab },
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_with_default(if cli.verbose { "debug" } else { "warn" })?;

    let config = resolve_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let pretty = cli.pretty || config.pretty;

    let mut runtime = ChatRuntime::new(&config.core);
    run_command(&mut runtime, cli.command.into(), pretty).await
}
