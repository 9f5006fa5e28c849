//! Search module - natural-language smart search over Slack history
//!
//! Public interface:
//! - `SmartSearch` runs the whole pipeline for a `SearchRequest`
//! - `QueryParser` / `parse_rules` turn a query into `SearchParams`
//! - `CandidateRetriever`, `Ranker`, `group`, `ResultFormatter` for the
//!   individual stages
//! - `EmbeddingCache` shared by semantic ranking across searches
//!
//! Internal (not exported):
//! - time phrase patterns

mod cache;
mod engine;
mod formatter;
mod grouper;
mod params;
mod parser;
mod ranker;
mod retriever;
mod timeframe;

pub use cache::{CacheStats, EmbeddingCache};
pub use engine::{SearchOutcome, SearchRequest, SmartSearch};
pub use formatter::{excerpt, no_results, ReportContext, ResultFormatter, Summarizer};
pub use grouper::{group, match_count, Conversation};
pub use params::{ContentType, SearchParams, Sentiment, TimeRange};
pub use parser::{fallback_keywords, parse_rules, tokenize, ParseDegradation, QueryParser};
pub use ranker::{keyword_matches, stem, Ranker, ScoredMatch};
pub use retriever::{CandidateRetriever, Candidates};
pub use timeframe::resolve as resolve_time_phrase;
