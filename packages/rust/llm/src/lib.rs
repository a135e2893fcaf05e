//! Text completion capability used for structured extraction.
//!
//! This crate provides:
//! - [`CompletionClient`] — the async trait extractors and agents call
//! - [`OpenRouterClient`] — an OpenAI-compatible chat-completions client

pub mod openrouter;

pub use openrouter::OpenRouterClient;

use async_trait::async_trait;

use leadsense_shared::Result;

/// One instruction/content exchange with the completion model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instructions (output format, role).
    pub system: String,
    /// The user message carrying the source text.
    pub user: String,
    /// Upper bound on reply tokens.
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: None,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Reply text plus token accounting.
#[derive(Debug, Clone, Default)]
pub struct CompletionResponse {
    pub text: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub model: String,
}

/// A text-to-text completion service.
///
/// Implementations must be shareable across tasks; the scraper holds one
/// behind an `Arc` and calls it from every URL unit concurrently.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run one completion. Failures map to `LeadsenseError::Extraction`
    /// (API/reply problems) or `LeadsenseError::Network` (transport).
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}
