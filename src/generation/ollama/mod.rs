#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerationRequest, Generator};
use crate::config::OllamaConfig;
use crate::ollama::OllamaClient;
use crate::{QaError, Result};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

/// Generation backend backed by Ollama's non-streaming `/api/chat` endpoint
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
    model: String,
    temperature: f32,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(config: &OllamaConfig, model: &str, temperature: f32) -> Result<Self> {
        let client = OllamaClient::new(config)?;
        Ok(Self::with_client(client, model, temperature))
    }

    #[inline]
    pub fn with_client(client: OllamaClient, model: &str, temperature: f32) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature,
        }
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[inline]
    pub fn client(&self) -> &OllamaClient {
        &self.client
    }
}

impl Generator for OllamaGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let system = request.system_message();

        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage {
            role: "system",
            content: &system,
        });
        messages.extend(request.history.iter().map(|message| ChatMessage {
            role: message.role.as_str(),
            content: &message.content,
        }));
        messages.push(ChatMessage {
            role: "user",
            content: &request.question,
        });

        debug!(
            "Requesting answer from {} with {} prior messages",
            self.model,
            request.history.len()
        );

        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response: ChatResponse = self
            .client
            .post_json("/api/chat", &body)
            .map_err(|e| QaError::Generation(format!("{:#}", e)))?;

        let answer = response.message.content.trim().to_string();
        if answer.is_empty() {
            return Err(QaError::Generation(format!(
                "Model {} returned an empty answer",
                self.model
            )));
        }

        Ok(answer)
    }

    fn describe(&self) -> String {
        format!("ollama ({} at {})", self.model, self.client.base_url())
    }
}
