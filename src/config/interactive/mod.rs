
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{
    Config, ConfigError, EmbeddingBackendKind, EmbeddingConfig, GenerationBackendKind,
    GenerationConfig, OllamaConfig,
};
use crate::embeddings::chunking::ChunkingConfig;
use crate::ollama::OllamaClient;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 docqa Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Ollama Connection").bold().yellow());
    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Embedding Model").bold().yellow());
    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Generation Model").bold().yellow());
    configure_generation(&mut config.generation)?;

    eprintln!();
    eprintln!("{}", style("Chunking & Retrieval").bold().yellow());
    configure_chunking(&mut config.chunking)?;
    config.retrieval.top_k = Input::new()
        .with_prompt("Chunks retrieved per question")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Must be between 1 and 100")
            }
        })
        .interact_text()?;

    let uses_ollama = config.embedding.backend == EmbeddingBackendKind::Ollama
        || config.generation.backend == GenerationBackendKind::Ollama;
    if uses_ollama {
        eprintln!();
        eprintln!("{}", style("Testing configuration...").yellow());

        if test_ollama_connection(&config.ollama) {
            eprintln!("{}", style("✓ Ollama connection successful!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not connect to Ollama").yellow()
            );
            eprintln!("You can continue, but make sure Ollama is running before ingesting.");
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Timeout: {}s", style(config.ollama.timeout_secs).cyan());

    eprintln!();
    eprintln!("{}", style("Embedding:").bold().yellow());
    eprintln!(
        "  Backend: {}",
        style(format!("{:?}", config.embedding.backend)).cyan()
    );
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());
    if config.embedding.backend == EmbeddingBackendKind::Hashing {
        eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
    }

    eprintln!();
    eprintln!("{}", style("Generation:").bold().yellow());
    eprintln!(
        "  Backend: {}",
        style(format!("{:?}", config.generation.backend)).cyan()
    );
    eprintln!("  Model: {}", style(&config.generation.model).cyan());
    eprintln!(
        "  Temperature: {}",
        style(config.generation.temperature).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Chunking & Retrieval:").bold().yellow());
    eprintln!(
        "  Chunk Size: {} characters",
        style(config.chunking.chunk_size).cyan()
    );
    eprintln!(
        "  Overlap: {} characters",
        style(config.chunking.overlap).cyan()
    );
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("Existing configuration is unreadable. Using defaults.").yellow()
            );
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| {
            if config.config_file_path().exists() {
                eprintln!("{}", style("Found existing configuration.").green());
            } else {
                eprintln!(
                    "{}",
                    style("No existing configuration found. Using defaults.").yellow()
                );
            }
            config
        },
    )
}

/// Position of `current` in `items`, falling back to the first entry
fn default_index<T: PartialEq>(items: &[T], current: &T) -> usize {
    items.iter().position(|item| item == current).unwrap_or(0)
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index(protocols, &ollama.protocol.as_str()))
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let timeout_secs: u64 = Input::new()
        .with_prompt("Request timeout (seconds)")
        .default(ollama.timeout_secs)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=3600).contains(input) {
                Ok(())
            } else {
                Err("Timeout must be between 1 and 3600 seconds")
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_timeout_secs(timeout_secs)?;

    Ok(())
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let backends = [EmbeddingBackendKind::Ollama, EmbeddingBackendKind::Hashing];
    let backend_index = Select::new()
        .with_prompt("Embedding backend")
        .default(default_index(&backends, &embedding.backend))
        .items(&["ollama", "hashing (offline)"])
        .interact()?;
    embedding.backend = backends[backend_index];

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    embedding.set_model(model)?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    embedding.set_batch_size(batch_size)?;

    if embedding.backend == EmbeddingBackendKind::Hashing {
        let dimension: u32 = Input::new()
            .with_prompt("Vector dimension")
            .default(embedding.dimension)
            .validate_with(|input: &u32| -> Result<(), &str> {
                if (8..=4096).contains(input) {
                    Ok(())
                } else {
                    Err("Dimension must be between 8 and 4096")
                }
            })
            .interact_text()?;
        embedding.set_dimension(dimension)?;
    }

    Ok(())
}

fn configure_generation(generation: &mut GenerationConfig) -> Result<()> {
    let backends = [GenerationBackendKind::Ollama, GenerationBackendKind::Echo];
    let backend_index = Select::new()
        .with_prompt("Generation backend")
        .default(default_index(&backends, &generation.backend))
        .items(&["ollama", "echo (returns retrieved context)"])
        .interact()?;
    generation.backend = backends[backend_index];

    if generation.backend == GenerationBackendKind::Echo {
        return Ok(());
    }

    let model: String = Input::new()
        .with_prompt("Chat model")
        .default(generation.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    generation.set_model(model)?;

    let temperature: f32 = Input::new()
        .with_prompt("Sampling temperature")
        .default(generation.temperature)
        .validate_with(|input: &f32| -> Result<(), &str> {
            if (0.0..=2.0).contains(input) {
                Ok(())
            } else {
                Err("Temperature must be between 0.0 and 2.0")
            }
        })
        .interact_text()?;
    generation.set_temperature(temperature)?;

    Ok(())
}

fn configure_chunking(chunking: &mut ChunkingConfig) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Chunk size must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let overlap: usize = Input::new()
        .with_prompt("Overlap between chunks (characters)")
        .default(chunking.overlap.min(chunk_size.saturating_sub(1)))
        .validate_with(|input: &usize| -> Result<(), String> {
            if *input >= chunk_size {
                Err(format!("Overlap must be smaller than {}", chunk_size))
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    chunking.chunk_size = chunk_size;
    chunking.overlap = overlap;
    Ok(())
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    OllamaClient::new(ollama)
        .map(|client| client.with_timeout(std::time::Duration::from_secs(5)))
        .and_then(|client| client.ping())
        .is_ok()
}
