// Generation module
// Turns a question, retrieved context and prior history into an answer

pub mod ollama;


pub use ollama::OllamaGenerator;

use tracing::info;

use crate::Result;
use crate::config::{Config, GenerationBackendKind};
use crate::conversation::Message;

/// Fixed instruction sent ahead of the retrieved context
pub const SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use only the following pieces of retrieved context to answer the question. \
If the context is insufficient, say that you don't know. \
Use three sentences maximum and keep the answer concise.";

/// Everything a generator needs to produce one answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system_prompt: String,
    /// Retrieved chunk texts, best match first, separated by blank lines
    pub context: String,
    /// Prior messages of the thread, oldest first
    pub history: Vec<Message>,
    pub question: String,
}

impl GenerationRequest {
    #[inline]
    pub fn new(context: String, history: Vec<Message>, question: &str) -> Self {
        Self {
            system_prompt: SYSTEM_PROMPT.to_string(),
            context,
            history,
            question: question.to_string(),
        }
    }

    /// System message content: the instruction followed by the context block
    #[inline]
    pub fn system_message(&self) -> String {
        format!("{}\n\n{}", self.system_prompt, self.context)
    }
}

/// Capability that produces an answer for a prepared request.
///
/// Failures surface as [`crate::QaError::Generation`]; implementations do not retry.
pub trait Generator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> Result<String>;

    fn describe(&self) -> String;
}

/// Offline generator that answers with the retrieved context verbatim
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoGenerator;

impl Generator for EchoGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        Ok(request.context.clone())
    }

    fn describe(&self) -> String {
        "echo".to_string()
    }
}

/// The generation backends selectable from configuration
#[derive(Debug, Clone)]
pub enum GenerationModel {
    Ollama(OllamaGenerator),
    Echo(EchoGenerator),
}

impl GenerationModel {
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let model = match config.generation.backend {
            GenerationBackendKind::Ollama => Self::Ollama(OllamaGenerator::new(
                &config.ollama,
                &config.generation.model,
                config.generation.temperature,
            )?),
            GenerationBackendKind::Echo => Self::Echo(EchoGenerator),
        };
        info!("Using generation backend {}", model.describe());
        Ok(model)
    }
}

impl Generator for GenerationModel {
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        match self {
            Self::Ollama(generator) => generator.generate(request),
            Self::Echo(generator) => generator.generate(request),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Ollama(generator) => generator.describe(),
            Self::Echo(generator) => generator.describe(),
        }
    }
}
