//! Ranker: scores candidate messages against parsed parameters
//!
//! Score = keyword overlap (optionally blended with embedding similarity)
//! plus fixed boosts for the user, content-type and tone filters, clamped to
//! [0, 1]. Every match carries the reasons that produced its score.

use std::cmp::Ordering;
use std::sync::Arc;

use super::cache::EmbeddingCache;
use super::params::{ContentType, SearchParams};
use crate::config::SearchSection;
use crate::embeddings::{relevance, Embedder};
use crate::slack::{Message, UserDirectory};

/// A candidate that survived ranking
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMatch {
    pub message: Message,
    /// In [0, 1]
    pub score: f32,
    /// Human-readable, in the order the signals were applied
    pub reasons: Vec<String>,
}

/// Suffixes stripped for stem matching, longest first
const SUFFIXES: &[&str] = &[
    "ations", "ation", "ments", "ment", "ings", "ing", "ions", "ion", "ies", "ied", "ers",
    "er", "ed", "es", "s",
];

const MIN_STEM_CHARS: usize = 4;

/// Crude stem: strip one suffix when at least four characters remain
pub fn stem(word: &str) -> &str {
    SUFFIXES
        .iter()
        .filter_map(|suffix| word.strip_suffix(suffix))
        .find(|rest| rest.chars().count() >= MIN_STEM_CHARS)
        .unwrap_or(word)
}

/// Case-insensitive substring or stem match; `text_lower` must be lowercased
pub fn keyword_matches(keyword: &str, text_lower: &str) -> bool {
    let keyword = keyword.to_lowercase();
    if keyword.is_empty() {
        return false;
    }
    if text_lower.contains(&keyword) {
        return true;
    }
    let root = stem(&keyword);
    root.len() < keyword.len() && text_lower.contains(root)
}

/// Embedding side of semantic mode
#[derive(Clone)]
struct SemanticScorer {
    embedder: Arc<dyn Embedder>,
    cache: Arc<EmbeddingCache>,
}

#[derive(Clone)]
pub struct Ranker {
    config: SearchSection,
    semantic: Option<SemanticScorer>,
}

impl std::fmt::Debug for Ranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ranker")
            .field("semantic", &self.semantic.as_ref().map(|s| s.embedder.model_name()))
            .finish()
    }
}

impl Ranker {
    pub fn new(config: SearchSection) -> Self {
        Self {
            config,
            semantic: None,
        }
    }

    /// Enable semantic mode
    pub fn with_semantic(mut self, embedder: Arc<dyn Embedder>, cache: Arc<EmbeddingCache>) -> Self {
        self.semantic = Some(SemanticScorer { embedder, cache });
        self
    }

    pub fn is_semantic(&self) -> bool {
        self.semantic.is_some()
    }

    /// Rank without sender names (user filter matches ids only)
    pub fn rank(&self, params: &SearchParams, candidates: &[Message]) -> Vec<ScoredMatch> {
        self.rank_with(params, candidates, &UserDirectory::default())
    }

    /// Rank, resolving the user filter through `users`
    pub fn rank_with(
        &self,
        params: &SearchParams,
        candidates: &[Message],
        users: &UserDirectory,
    ) -> Vec<ScoredMatch> {
        let query_vector = self.query_vector(params);

        let mut matches: Vec<ScoredMatch> = candidates
            .iter()
            .filter_map(|message| self.score(params, message, users, query_vector.as_deref()))
            .collect();

        matches.sort_by(compare_matches);
        matches
    }

    fn query_vector(&self, params: &SearchParams) -> Option<Vec<f32>> {
        let semantic = self.semantic.as_ref()?;
        let query = params.keyword_query();
        if query.is_empty() {
            return None;
        }
        match semantic.embedder.embed_query(&query) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("query embedding failed, keyword-only ranking: {e}");
                None
            }
        }
    }

    fn message_relevance(&self, message: &Message, query_vector: &[f32]) -> Option<f32> {
        let semantic = self.semantic.as_ref()?;
        let vector = semantic
            .cache
            .get_or_insert_with(&message.cache_key(), || semantic.embedder.embed(&message.text));
        match vector {
            Ok(v) => Some(relevance(query_vector, &v)),
            Err(e) => {
                tracing::debug!(message = %message.cache_key(), "message embedding failed: {e}");
                None
            }
        }
    }

    fn score(
        &self,
        params: &SearchParams,
        message: &Message,
        users: &UserDirectory,
        query_vector: Option<&[f32]>,
    ) -> Option<ScoredMatch> {
        let text = message.text.to_lowercase();
        let mut reasons = Vec::new();

        let matched: Vec<&String> = params
            .keywords
            .iter()
            .filter(|k| keyword_matches(k, &text))
            .collect();
        let keyword_score = if params.keywords.is_empty() {
            0.0
        } else {
            matched.len() as f32 / params.keywords.len() as f32
        };
        reasons.extend(matched.iter().map(|k| format!("keyword: {}", k)));

        let similarity = query_vector.and_then(|q| self.message_relevance(message, q));
        let base = match similarity {
            Some(sim) => {
                if sim >= self.config.similarity_threshold {
                    reasons.push(format!("semantic similarity: {:.2}", sim));
                }
                let w = self.config.semantic_weight.clamp(0.0, 1.0);
                w * sim + (1.0 - w) * keyword_score
            }
            None => keyword_score,
        };

        let user_match = params
            .user_filter
            .as_deref()
            .filter(|filter| users.matches(&message.user_id, filter));

        let relevant = match similarity {
            Some(_) => base > self.config.similarity_threshold,
            None => base > 0.0,
        };
        // Boosts only raise a relevant match
        if !relevant {
            return None;
        }

        let mut score = base;
        if let Some(filter) = user_match {
            score += self.config.user_boost;
            reasons.push(format!("matches user filter: {}", filter));
        }
        if let Some(ct) = params
            .content_type
            .filter(|ct| *ct != ContentType::General && ct.appears_in(&text))
        {
            score += self.config.content_boost;
            reasons.push(format!("content type: {}", ct.as_str()));
        }
        if let Some(sentiment) = params.sentiment.filter(|s| s.appears_in(&text)) {
            score += self.config.sentiment_boost;
            reasons.push(format!("tone: {}", sentiment.as_str()));
        }

        let score = score.clamp(0.0, 1.0);
        (score >= self.config.min_score).then(|| ScoredMatch {
            message: message.clone(),
            score,
            reasons,
        })
    }
}

/// Score descending, then newer first, then channel/id for a stable order
fn compare_matches(a: &ScoredMatch, b: &ScoredMatch) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.message.timestamp.cmp(&a.message.timestamp))
        .then_with(|| a.message.channel_id.cmp(&b.message.channel_id))
        .then_with(|| a.message.id.cmp(&b.message.id))
}
