use clap::{Parser, Subcommand};
use docqa::Result;
use docqa::commands::{
    ask_question, ingest_document, list_threads, resolve_data_dir, run_chat, run_evaluation,
    show_history, show_status,
};
use docqa::config::{Config, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "docqa")]
#[command(about = "Ask questions about a document using a local retrieval-augmented pipeline")]
#[command(version)]
struct Cli {
    /// Data directory holding config.toml, the index and conversations
    /// (defaults to $DOCQA_HOME, then ~/.docqa)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure backends, chunking and retrieval
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Index a UTF-8 text document, replacing the current index
    Ingest {
        /// Path of the text file; form feeds separate pages
        path: PathBuf,
        /// Identifier stored with every chunk (defaults to the file name)
        #[arg(long)]
        doc_id: Option<String>,
    },
    /// Ask a single question
    Ask {
        question: String,
        /// Conversation thread to continue
        #[arg(long)]
        thread: Option<String>,
    },
    /// Start an interactive question session
    Chat {
        /// Conversation thread to resume (a new one is created when omitted)
        #[arg(long)]
        thread: Option<String>,
    },
    /// Show the messages of a conversation thread
    History {
        #[arg(long)]
        thread: Option<String>,
    },
    /// List conversation threads
    Threads,
    /// Show index statistics and backend health
    Status,
    /// Score answers against a JSON dataset of {question, expected} pairs
    Evaluate {
        dataset: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir)?;

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&data_dir)?;
        } else {
            run_interactive_config(&data_dir)?;
        }
        return Ok(());
    }

    let config = Config::load(&data_dir)?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::Ingest { path, doc_id } => {
            ingest_document(&config, &path, doc_id).await?;
        }
        Commands::Ask { question, thread } => {
            ask_question(&config, &question, thread).await?;
        }
        Commands::Chat { thread } => {
            run_chat(&config, thread).await?;
        }
        Commands::History { thread } => {
            show_history(&config, thread).await?;
        }
        Commands::Threads => {
            list_threads(&config).await?;
        }
        Commands::Status => {
            show_status(&config).await?;
        }
        Commands::Evaluate { dataset } => {
            run_evaluation(&config, &dataset).await?;
        }
    }

    Ok(())
}
