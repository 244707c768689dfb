//! LLM integration.
//!
//! The profile pipeline only needs plain chat completions, served by any
//! endpoint that speaks the OpenAI Chat Completions API.

mod openai_compatible;
mod provider;

pub use openai_compatible::OpenAiCompatibleProvider;
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::LlmError;

/// Create the LLM provider described by configuration.
pub fn create_llm_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let provider = OpenAiCompatibleProvider::new(config.clone())?;
    tracing::info!(
        model = %config.model,
        base_url = %config.base_url,
        "Using OpenAI-compatible endpoint"
    );
    Ok(Arc::new(provider))
}
