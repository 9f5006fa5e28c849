//! Embeddings for semantic mode
//!
//! `Embedder` turns text into vectors. `OpenAiClient` implements it against
//! an embeddings endpoint; tests use deterministic fakes.

mod similarity;

pub use similarity::{cosine_similarity, relevance};

use crate::error::LlmError;

/// Trait for embedding generation
///
/// Takes `&self` so one embedder can back the shared embedding cache.
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    /// Generate embedding for a search query
    ///
    /// Asymmetric models format queries differently from passages.
    /// Default implementation calls embed().
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed(text)
    }

    /// Get model name
    fn model_name(&self) -> &str;
}
