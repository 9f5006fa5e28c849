//! Error types for the Slack adapter, the model collaborators and the search pipeline.
//!
//! Library code returns these typed errors. The CLI and the MCP loop wrap them
//! in `anyhow` at the edges, and every tool result ends up as plain text.

use thiserror::Error;

/// Slack Web API failures.
#[derive(Error, Debug)]
pub enum SlackError {
    /// No bot token was configured
    #[error("Slack client not initialized. Please set SLACK_BOT_TOKEN environment variable.")]
    NotConfigured,

    /// The request did not complete within the configured bound
    #[error("Slack API call {method} timed out")]
    Timeout { method: String },

    /// Transport-level failure
    #[error("Slack HTTP error on {method}: {source}")]
    Http {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    /// Slack answered with `ok: false`
    #[error("Slack API error on {method}: {code}")]
    Api { method: String, code: String },

    /// Response body did not have the expected shape
    #[error("unexpected Slack response for {method}: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl SlackError {
    /// Whether the failure means the token cannot see the resource.
    pub fn is_access_denied(&self) -> bool {
        match self {
            SlackError::NotConfigured => true,
            SlackError::Api { code, .. } => matches!(
                code.as_str(),
                "not_in_channel"
                    | "channel_not_found"
                    | "missing_scope"
                    | "not_authed"
                    | "invalid_auth"
                    | "access_denied"
                    | "account_inactive"
            ),
            _ => false,
        }
    }

    /// Slack error code, if Slack returned one.
    pub fn code(&self) -> Option<&str> {
        match self {
            SlackError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Language-model and embedding provider failures.
#[derive(Error, Debug)]
pub enum LlmError {
    /// No API key configured
    #[error("no language model configured")]
    NotConfigured,

    /// The call exceeded its time bound
    #[error("language model call timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("language model HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    /// Non-success status from the provider
    #[error("language model returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("language model returned an empty response")]
    EmptyResponse,

    #[error("unexpected language model response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Candidate retrieval failed. Callers treat this as an empty candidate set.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Channel access denied or the history call failed
    #[error("could not read channel {channel}: {source}")]
    Channel {
        channel: String,
        #[source]
        source: SlackError,
    },

    /// The accessible channel list could not be fetched
    #[error("could not list channels: {0}")]
    ChannelList(#[source] SlackError),

    /// Every scanned channel failed
    #[error("no channel could be read ({failed} failed)")]
    AllChannelsFailed { failed: usize },
}

/// Errors surfaced by the smart-search entry point before formatting.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Empty query string
    #[error("query must not be empty")]
    InvalidInput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_codes() {
        let denied = SlackError::Api {
            method: "conversations.history".into(),
            code: "not_in_channel".into(),
        };
        assert!(denied.is_access_denied());
        assert_eq!(denied.code(), Some("not_in_channel"));

        let limited = SlackError::Api {
            method: "conversations.history".into(),
            code: "ratelimited".into(),
        };
        assert!(!limited.is_access_denied());
        assert!(SlackError::NotConfigured.is_access_denied());
    }

    #[test]
    fn test_retrieval_error_message_names_channel() {
        let err = RetrievalError::Channel {
            channel: "C42".into(),
            source: SlackError::Api {
                method: "conversations.history".into(),
                code: "channel_not_found".into(),
            },
        };
        assert!(err.to_string().contains("C42"));
        assert!(err.to_string().contains("channel_not_found"));
    }
}
