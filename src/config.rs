//! Server configuration
//!
//! Layering: built-in defaults, then an optional TOML file, then environment.
//! Credentials only ever come from the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Full configuration for the server and the search pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub slack: SlackSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub search: SearchSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackSection {
    /// Web API base URL
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
    /// Per-request timeout
    #[serde(default = "default_slack_timeout")]
    pub timeout_secs: u64,
    /// Bot token (SLACK_BOT_TOKEN only)
    #[serde(skip)]
    pub bot_token: Option<String>,
}

fn default_slack_api_base() -> String {
    "https://slack.com/api".to_string()
}
fn default_slack_timeout() -> u64 {
    15
}

impl Default for SlackSection {
    fn default() -> Self {
        Self {
            api_base: default_slack_api_base(),
            timeout_secs: default_slack_timeout(),
            bot_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    /// OpenAI-compatible API base URL
    #[serde(default = "default_llm_api_base")]
    pub api_base: String,
    /// Chat model for query parsing and summaries
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Embedding model for semantic mode
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    /// Blend embedding similarity into ranking (needs an API key)
    #[serde(default)]
    pub semantic: bool,
    /// API key (OPENAI_API_KEY only)
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_llm_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_llm_timeout() -> u64 {
    20
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            api_base: default_llm_api_base(),
            model: default_chat_model(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_llm_timeout(),
            semantic: false,
            api_key: None,
        }
    }
}

/// Ranking and retrieval tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSection {
    /// Hard cap on candidate messages per search
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,
    /// Channels scanned when no channel is given
    #[serde(default = "default_channel_scan_limit")]
    pub channel_scan_limit: usize,
    /// History messages requested per channel
    #[serde(default = "default_history_per_channel")]
    pub history_per_channel: usize,
    /// Minimum blended score in semantic mode
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Weight of cosine similarity in the blend (keyword gets the rest)
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,
    #[serde(default = "default_user_boost")]
    pub user_boost: f32,
    #[serde(default = "default_content_boost")]
    pub content_boost: f32,
    #[serde(default = "default_sentiment_boost")]
    pub sentiment_boost: f32,
    /// Matches below this final score are dropped
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    #[serde(default = "default_max_conversations_shown")]
    pub max_conversations_shown: usize,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    /// Pull thread replies for roots found in history
    #[serde(default)]
    pub expand_threads: bool,
}

fn default_candidate_limit() -> usize {
    300
}
fn default_channel_scan_limit() -> usize {
    10
}
fn default_history_per_channel() -> usize {
    100
}
fn default_similarity_threshold() -> f32 {
    0.25
}
fn default_semantic_weight() -> f32 {
    0.6
}
fn default_user_boost() -> f32 {
    0.2
}
fn default_content_boost() -> f32 {
    0.1
}
fn default_sentiment_boost() -> f32 {
    0.05
}
fn default_min_score() -> f32 {
    0.1
}
fn default_max_conversations_shown() -> usize {
    3
}
fn default_excerpt_chars() -> usize {
    300
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            candidate_limit: default_candidate_limit(),
            channel_scan_limit: default_channel_scan_limit(),
            history_per_channel: default_history_per_channel(),
            similarity_threshold: default_similarity_threshold(),
            semantic_weight: default_semantic_weight(),
            user_boost: default_user_boost(),
            content_boost: default_content_boost(),
            sentiment_boost: default_sentiment_boost(),
            min_score: default_min_score(),
            max_conversations_shown: default_max_conversations_shown(),
            excerpt_chars: default_excerpt_chars(),
            expand_threads: false,
        }
    }
}

impl Config {
    /// Load configuration from `path` (or the default location) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_path().filter(|p| p.exists()),
        };

        let mut config = match file {
            Some(p) => Self::from_file(&p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Apply environment overrides through a lookup function (testable without touching the process env)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty("SLACK_BOT_TOKEN") {
            self.slack.bot_token = Some(token);
        }
        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(base) = non_empty("OPENAI_BASE_URL") {
            self.llm.api_base = base;
        }
        if let Some(model) = non_empty("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(model) = non_empty("OPENAI_EMBEDDING_MODEL") {
            self.llm.embedding_model = model;
        }
        if let Some(flag) = non_empty("SLACK_MCP_SEMANTIC") {
            self.llm.semantic = matches!(
                flag.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }

    /// Semantic mode is only usable with a key for the embedding endpoint
    pub fn semantic_enabled(&self) -> bool {
        self.llm.semantic && self.llm.api_key.is_some()
    }

    /// Render as TOML with credentials reported by presence only
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut out = toml::to_string_pretty(self).context("Failed to serialize config")?;
        out.push_str(&format!(
            "\n# SLACK_BOT_TOKEN: {}\n# OPENAI_API_KEY: {}\n",
            presence(&self.slack.bot_token),
            presence(&self.llm.api_key)
        ));
        Ok(out)
    }
}

fn presence(secret: &Option<String>) -> &'static str {
    if secret.is_some() {
        "set"
    } else {
        "not set"
    }
}

/// `<config_dir>/slack-mcp/config.toml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("slack-mcp").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.search.candidate_limit, 300);
        assert_eq!(config.search.max_conversations_shown, 3);
        assert_eq!(config.slack.api_base, "https://slack.com/api");
        assert!(!config.semantic_enabled());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("SLACK_BOT_TOKEN", "xoxb-test"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-test"),
            ("SLACK_MCP_SEMANTIC", "true"),
        ]));
        assert_eq!(config.slack.bot_token.as_deref(), Some("xoxb-test"));
        assert_eq!(config.llm.model, "gpt-test");
        assert!(config.semantic_enabled());
    }

    #[test]
    fn test_semantic_requires_key() {
        let mut config = Config::default();
        config.apply_env(env(&[("SLACK_MCP_SEMANTIC", "1"), ("OPENAI_API_KEY", "  ")]));
        assert!(config.llm.semantic);
        assert!(!config.semantic_enabled());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[search]\ncandidate_limit = 50\nuser_boost = 0.3\n\n[llm]\nmodel = \"local\""
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.search.candidate_limit, 50);
        assert_eq!(config.search.history_per_channel, 100);
        assert_eq!(config.llm.model, "local");
        assert_eq!(config.slack.timeout_secs, 15);
    }

    #[test]
    fn test_redacted_output_hides_secrets() {
        let mut config = Config::default();
        config.apply_env(env(&[("SLACK_BOT_TOKEN", "xoxb-secret")]));
        let rendered = config.to_redacted_toml().unwrap();
        assert!(!rendered.contains("xoxb-secret"));
        assert!(rendered.contains("SLACK_BOT_TOKEN: set"));
        assert!(rendered.contains("OPENAI_API_KEY: not set"));
    }
}
