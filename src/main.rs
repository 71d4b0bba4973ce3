use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use second_gateway::{Assistant, Config, KeepAlive, Reply};

/// Second - Retrieval-augmented assistant grounded in memory and knowledge
#[derive(Parser)]
#[command(name = "second", version, about)]
struct Cli {
    /// Conversation identifier used for short-term history
    #[arg(short, long, env = "SECOND_CONVERSATION", default_value = "local")]
    conversation: String,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a single question and print the reply
    Ask {
        /// Question text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Interactive session on stdin (default)
    Chat,
    /// Show service health
    Status,
}

/// Prints a dot to stderr on every pulse while the model works
struct Dots;

#[async_trait]
impl KeepAlive for Dots {
    async fn pulse(&self) -> second_gateway::Result<()> {
        let mut stderr = std::io::stderr();
        write!(stderr, ".")?;
        stderr.flush()?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,second_gateway=info",
        1 => "info,second_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    let assistant = Assistant::from_config(&config);

    match cli.command.unwrap_or(Command::Chat) {
        Command::Ask { text } => {
            let reply = assistant
                .handle_query_with(&cli.conversation, &text.join(" "), Some(Arc::new(Dots)))
                .await;
            eprintln!();
            print_reply(&reply);
            assistant.drain().await;
            if reply.is_error() {
                anyhow::bail!("no reply from the model");
            }
        }
        Command::Chat => chat(&assistant, &cli.conversation).await?,
        Command::Status => println!("{}", assistant.status(&cli.conversation).await),
    }

    Ok(())
}

/// Line-oriented session; slash commands are handled here, not by the model
async fn chat(assistant: &Assistant, conversation_id: &str) -> anyhow::Result<()> {
    println!("Second ready. /clear, /remember <text>, /status; Ctrl-D to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').unwrap_or((line, "")) {
            ("/clear", _) => {
                if assistant.clear(conversation_id).await {
                    println!("History cleared.");
                } else {
                    println!("No history to clear.");
                }
            }
            ("/remember", note) => match assistant.remember(note).await {
                Ok(()) => println!("Remembered."),
                Err(e) => println!("Could not remember: {e}"),
            },
            ("/status", _) => println!("{}", assistant.status(conversation_id).await),
            _ => {
                let reply = assistant
                    .handle_query_with(conversation_id, line, Some(Arc::new(Dots)))
                    .await;
                eprintln!();
                print_reply(&reply);
            }
        }
    }

    if assistant.pending_writes() > 0 {
        tracing::info!(pending = assistant.pending_writes(), "waiting for background writes");
    }
    assistant.drain().await;
    Ok(())
}

fn print_reply(reply: &Reply) {
    for segment in &reply.segments {
        println!("{segment}\n");
    }
}
