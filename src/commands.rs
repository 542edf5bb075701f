use anyhow::Context;
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::Result;
use crate::config::{Config, EmbeddingBackendKind, GenerationBackendKind, get_config_dir};
use crate::conversation::{DEFAULT_THREAD_ID, Message, Role};
use crate::document::load_text_file;
use crate::evaluation::{evaluate, load_dataset};
use crate::ollama::OllamaClient;
use crate::service::QaService;

/// Resolve the data directory from `--data-dir`, `DOCQA_HOME` or the home directory
#[inline]
pub fn resolve_data_dir(data_dir: Option<PathBuf>) -> Result<PathBuf> {
    match data_dir {
        Some(dir) => Ok(dir),
        None => Ok(get_config_dir()?),
    }
}

fn spinner(message: String) -> Result<ProgressBar> {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}").context("Invalid spinner template")?,
    );
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(100));
    Ok(progress)
}

/// Build the service and activate the index from the last ingest
async fn open_service(config: &Config) -> Result<QaService> {
    let service = QaService::from_config(config).await?;
    if service.load_persisted_index().await?.is_none() {
        warn!("No index found; run 'docqa ingest <file>' first");
    }
    Ok(service)
}

fn print_message(message: &Message) {
    let role = match message.role {
        Role::User => style("you").bold().green(),
        Role::Assistant => style("assistant").bold().cyan(),
        Role::System => style("system").bold().dim(),
    };
    println!(
        "[{}] {} {}",
        message.sequence,
        role,
        style(message.created_at.format("%Y-%m-%d %H:%M:%S")).dim()
    );
    println!("{}", message.content);
    println!();
}

/// Load, chunk, embed and index a text file, replacing the active index
#[inline]
pub async fn ingest_document(config: &Config, path: &Path, doc_id: Option<String>) -> Result<()> {
    let document = load_text_file(path, doc_id)?;
    let service = QaService::from_config(config).await?;

    let progress = spinner(format!(
        "Embedding '{}' ({} characters)...",
        document.id,
        document.char_count()
    ))?;
    let result = service.ingest(&document).await;
    progress.finish_and_clear();

    let report = result.inspect_err(|e| error!("Ingest failed: {}", e))?;
    info!("Ingested {} into {} chunks", report.doc_id, report.chunks);

    println!(
        "{} Indexed '{}'",
        style("✓").green(),
        style(&report.doc_id).bold()
    );
    println!("  Chunks: {}", report.chunks);
    println!("  Dimension: {}", report.dimension);
    if let Some(index_path) = service.index_path().filter(|_| report.persisted) {
        println!("  Saved to: {}", style(index_path.display()).dim());
    }

    Ok(())
}

/// Ask a single question on a thread
#[inline]
pub async fn ask_question(config: &Config, question: &str, thread: Option<String>) -> Result<()> {
    let service = open_service(config).await?;
    let thread_id = thread.unwrap_or_else(|| DEFAULT_THREAD_ID.to_string());

    let answer = service.ask(&thread_id, question).await?;
    println!("{}", answer.content);

    Ok(())
}

/// Interactive question loop; an empty line or `exit` ends the session
#[inline]
pub async fn run_chat(config: &Config, thread: Option<String>) -> Result<()> {
    let service = open_service(config).await?;
    let thread_id = thread.unwrap_or_else(|| Uuid::new_v4().to_string());

    eprintln!(
        "{} thread {}",
        style("💬 Chatting on").bold().cyan(),
        style(&thread_id).yellow()
    );
    eprintln!("{}", style("Type 'exit' or press enter on an empty line to quit.").dim());
    eprintln!();

    loop {
        let question: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read question")?;

        let question = question.trim();
        if question.is_empty() || question.eq_ignore_ascii_case("exit") {
            break;
        }

        match service.ask(&thread_id, question).await {
            Ok(answer) => {
                println!("{} {}", style("Assistant:").bold().cyan(), answer.content);
                println!();
            }
            Err(e) => {
                error!("Question failed: {}", e);
                eprintln!("{} {}", style("Error:").red(), e);
            }
        }
    }

    eprintln!(
        "Resume later with: docqa chat --thread {}",
        style(&thread_id).yellow()
    );
    Ok(())
}

/// Print the messages of a thread
#[inline]
pub async fn show_history(config: &Config, thread: Option<String>) -> Result<()> {
    let service = QaService::from_config(config).await?;
    let thread_id = thread.unwrap_or_else(|| DEFAULT_THREAD_ID.to_string());

    let history = service.history(&thread_id).await?;
    if history.is_empty() {
        println!("Thread '{}' has no messages yet.", thread_id);
        return Ok(());
    }

    println!(
        "Thread '{}' ({} messages):",
        style(&thread_id).bold(),
        history.len()
    );
    println!();
    for message in &history {
        print_message(message);
    }

    Ok(())
}

/// List known conversation threads
#[inline]
pub async fn list_threads(config: &Config) -> Result<()> {
    let service = QaService::from_config(config).await?;
    let threads = service.threads().await?;

    if threads.is_empty() {
        println!("No conversations yet.");
        println!("Use 'docqa ask <question>' or 'docqa chat' to start one.");
        return Ok(());
    }

    println!("Conversation threads ({} total):", threads.len());
    for thread_id in &threads {
        let messages = service.history(thread_id).await?;
        let last = messages.last().map_or_else(String::new, |m| {
            m.created_at.format("%Y-%m-%d %H:%M:%S").to_string()
        });
        println!(
            "  {} {} messages, last {}",
            style(thread_id).cyan(),
            messages.len(),
            style(last).dim()
        );
    }

    Ok(())
}

/// Show index statistics and check the configured Ollama backends
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    let service = QaService::from_config(config).await?;

    println!("{}", style("📊 docqa Status").bold().cyan());
    println!();
    println!("Data directory: {}", style(config.get_base_dir().display()).dim());
    println!("Embedding: {}", service.embedder().describe());
    println!("Generation: {}", service.generator().describe());
    println!();

    match service.load_persisted_index().await {
        Ok(Some(stats)) => {
            println!("{}", style("Index:").bold().yellow());
            println!("  Chunks: {}", stats.entries);
            println!("  Dimension: {}", stats.dimension);
            println!("  Documents: {}", stats.documents.join(", "));
        }
        Ok(None) => println!("{}", style("Index: not built yet").yellow()),
        Err(e) => println!("{} {}", style("Index: unreadable -").red(), e),
    }

    let mut models = Vec::new();
    if config.embedding.backend == EmbeddingBackendKind::Ollama {
        models.push(config.embedding.model.as_str());
    }
    if config.generation.backend == GenerationBackendKind::Ollama {
        models.push(config.generation.model.as_str());
    }

    if !models.is_empty() {
        println!();
        let health = OllamaClient::new(&config.ollama)
            .map(|client| client.with_timeout(Duration::from_secs(5)))
            .and_then(|client| client.health_check(&models));
        match health {
            Ok(()) => println!(
                "{} Ollama reachable with models {}",
                style("✓").green(),
                models.join(", ")
            ),
            Err(e) => println!("{} Ollama check failed: {:#}", style("⚠").yellow(), e),
        }
    }

    let threads = service.threads().await?;
    println!();
    println!("Conversation threads: {}", threads.len());

    Ok(())
}

/// Run the evaluation harness over a JSON dataset and print the report
#[inline]
pub async fn run_evaluation(config: &Config, dataset: &Path) -> Result<()> {
    let cases = load_dataset(dataset)?;
    let service = open_service(config).await?;

    let progress = spinner(format!("Evaluating {} questions...", cases.len()))?;
    let result = evaluate(&service, &cases).await;
    progress.finish_and_clear();
    let report = result?;

    println!("{}", style("📈 Evaluation Report").bold().cyan());
    println!("  Questions: {}", report.total);
    println!(
        "  Exact matches: {} ({:.1}%)",
        report.exact_matches,
        report.accuracy * 100.0
    );
    println!("  Containment: {:.1}%", report.containment_rate * 100.0);
    println!("  Fallback rate: {:.1}%", report.fallback_rate * 100.0);
    println!("  Average latency: {:.2}s", report.average_latency);

    let misses: Vec<_> = report.cases.iter().filter(|c| !c.contains_expected).collect();
    if !misses.is_empty() {
        println!();
        println!("{}", style("Missed questions:").bold().yellow());
        for case in misses {
            println!("  Q: {}", case.question);
            println!("     expected: {}", style(&case.expected).green());
            println!("     answered: {}", style(&case.answer).red());
        }
    }

    Ok(())
}
