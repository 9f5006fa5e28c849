//! Language-model collaborator
//!
//! Public interface:
//! - `LanguageModel` - `complete(prompt, max_tokens)`
//! - `ModelCapability` - LLM-backed or rule-based, chosen once at startup
//! - `OpenAiClient` - OpenAI-compatible chat + embeddings over blocking HTTP
//!
//! Query parsing and summaries take a `ModelCapability` and fall back to
//! their rule-based paths whenever the model is absent or fails.

mod openai;

pub use openai::OpenAiClient;

use std::sync::Arc;

use crate::config::LlmSection;
use crate::error::LlmError;

/// Text completion interface
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt`, returning the model's text
    fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;

    /// Model name for logging
    fn name(&self) -> &str;
}

/// How query parsing and summarisation are performed
#[derive(Clone, Default)]
pub enum ModelCapability {
    /// A language model is configured
    LlmBacked(Arc<dyn LanguageModel>),
    /// Pattern matching and templates only
    #[default]
    RuleBased,
}

impl ModelCapability {
    /// Pick the capability from config: LLM-backed when an API key is present
    pub fn from_config(section: &LlmSection) -> Self {
        match OpenAiClient::from_config(section) {
            Ok(Some(client)) => ModelCapability::LlmBacked(Arc::new(client)),
            Ok(None) => ModelCapability::RuleBased,
            Err(e) => {
                tracing::warn!("language model unavailable, using rule-based mode: {e}");
                ModelCapability::RuleBased
            }
        }
    }

    pub fn model(&self) -> Option<&dyn LanguageModel> {
        match self {
            ModelCapability::LlmBacked(model) => Some(model.as_ref()),
            ModelCapability::RuleBased => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ModelCapability::LlmBacked(model) => format!("llm ({})", model.name()),
            ModelCapability::RuleBased => "rule-based".to_string(),
        }
    }
}

impl std::fmt::Debug for ModelCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Strip markdown code fences and surrounding prose from a JSON answer
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object() {
        assert_eq!(
            extract_json_object("```json\n{\"a\": 1}\n```"),
            Some("{\"a\": 1}")
        );
        assert_eq!(
            extract_json_object("Here you go: {\"a\": {\"b\": 2}} thanks"),
            Some("{\"a\": {\"b\": 2}}")
        );
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[test]
    fn test_capability_from_config_without_key() {
        let section = LlmSection::default();
        let capability = ModelCapability::from_config(&section);
        assert!(capability.model().is_none());
        assert_eq!(capability.describe(), "rule-based");
    }
}
