//! Smart search: parse → retrieve → rank → group → format
//!
//! Every stage degrades instead of failing, so `search` always returns text.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::cache::EmbeddingCache;
use super::formatter::{no_results, ReportContext, ResultFormatter, Summarizer};
use super::grouper::{group, Conversation};
use super::params::SearchParams;
use super::parser::QueryParser;
use super::ranker::Ranker;
use super::retriever::{CandidateRetriever, Candidates};
use crate::config::{Config, SearchSection};
use crate::embeddings::Embedder;
use crate::error::SearchError;
use crate::llm::{ModelCapability, OpenAiClient};
use crate::slack::{SlackApi, UserDirectory};

/// Users fetched once per search for name matching and rendering
const USER_LOOKUP_LIMIT: usize = 1000;

fn semantic_embedder(config: &Config) -> Option<Arc<dyn Embedder>> {
    if !config.semantic_enabled() {
        return None;
    }
    match OpenAiClient::from_config(&config.llm) {
        Ok(Some(client)) => {
            tracing::info!(model = %client.model_name(), "semantic ranking enabled");
            Some(Arc::new(client))
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("embedder unavailable, keyword ranking only: {e}");
            None
        }
    }
}

/// Arguments of the `slack_smart_search` tool
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub channel_id: Option<String>,
    pub max_results: usize,
    pub include_summary: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            channel_id: None,
            max_results: 10,
            include_summary: true,
        }
    }
}

/// Pipeline output before and after formatting
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub params: SearchParams,
    pub conversations: Vec<Conversation>,
    pub report: String,
}

pub struct SmartSearch {
    slack: Arc<dyn SlackApi>,
    parser: QueryParser,
    ranker: Ranker,
    formatter: ResultFormatter,
    config: SearchSection,
    reference_time: Option<DateTime<Utc>>,
}

impl SmartSearch {
    /// The same capability drives query parsing and summaries
    pub fn new(slack: Arc<dyn SlackApi>, capability: ModelCapability, config: &SearchSection) -> Self {
        Self {
            slack,
            parser: QueryParser::new(capability.clone()),
            ranker: Ranker::new(config.clone()),
            formatter: ResultFormatter::new(Summarizer::new(capability), config),
            config: config.clone(),
            reference_time: None,
        }
    }

    /// Model capability and semantic ranking chosen from config
    pub fn from_config(slack: Arc<dyn SlackApi>, config: &Config) -> Self {
        let capability = ModelCapability::from_config(&config.llm);
        tracing::info!(capability = %capability.describe(), "query understanding");

        let engine = Self::new(slack, capability, &config.search);
        match semantic_embedder(config) {
            Some(embedder) => engine.with_semantic(embedder, Arc::new(EmbeddingCache::new())),
            None => engine,
        }
    }

    /// Blend embedding similarity into ranking
    pub fn with_semantic(mut self, embedder: Arc<dyn Embedder>, cache: Arc<EmbeddingCache>) -> Self {
        self.ranker = self.ranker.with_semantic(embedder, cache);
        self
    }

    /// Resolve relative time phrases against a fixed time instead of now
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }

    pub fn is_semantic(&self) -> bool {
        self.ranker.is_semantic()
    }

    /// Run the pipeline; failures are rendered into the returned text
    pub fn search(&self, request: &SearchRequest) -> String {
        match self.run(request) {
            Ok(outcome) => outcome.report,
            Err(SearchError::InvalidInput) => no_results(&request.query),
        }
    }

    pub fn run(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        if request.query.trim().is_empty() {
            return Err(SearchError::InvalidInput);
        }

        let now = self.reference_time.unwrap_or_else(Utc::now);
        let params = self.parser.parse_at(&request.query, now);
        tracing::debug!(?params, "parsed query");

        let retriever = CandidateRetriever::new(self.slack.as_ref(), &self.config);
        let scope = request.channel_id.as_deref().filter(|s| !s.trim().is_empty());
        let candidates = retriever
            .collect(&params, scope, self.config.candidate_limit)
            .unwrap_or_else(|e| {
                tracing::warn!("retrieval failed, searching zero candidates: {e}");
                Candidates::default()
            });

        let mut users = None;
        if params.user_filter.is_some() {
            users = Some(self.load_users());
        }

        let mut matches = self.ranker.rank_with(
            &params,
            &candidates.messages,
            users.as_ref().unwrap_or(&UserDirectory::default()),
        );
        matches.truncate(request.max_results.max(1));
        let conversations = group(matches);

        let report = if conversations.is_empty() {
            no_results(&request.query)
        } else {
            let context = ReportContext {
                users: users.unwrap_or_else(|| self.load_users()),
                channel_names: candidates.channel_names,
                filters: params.describe_filters(),
            };
            self.formatter.format_with(
                &conversations,
                &request.query,
                request.include_summary,
                &context,
            )
        };

        Ok(SearchOutcome {
            params,
            conversations,
            report,
        })
    }

    /// Best-effort: an empty directory only loses name matching
    fn load_users(&self) -> UserDirectory {
        match self.slack.list_users(USER_LOOKUP_LIMIT) {
            Ok(users) => UserDirectory::from_users(users),
            Err(e) => {
                tracing::warn!("user list unavailable: {e}");
                UserDirectory::default()
            }
        }
    }
}
