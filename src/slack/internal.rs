//! Blocking Slack Web API client

use chrono::{DateTime, Utc};
use reqwest::blocking::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::{format_ts, parse_ts, Channel, Message, SlackApi, SlackUser};
use crate::config::SlackSection;
use crate::error::SlackError;

/// Largest page Slack accepts for list endpoints
const PAGE_SIZE: usize = 200;

/// Slack Web API client (bot token, bearer auth)
pub struct SlackClient {
    api_base: String,
    token: String,
    http: HttpClient,
}

impl SlackClient {
    /// Create a client with a bounded per-request timeout
    pub fn new(token: String, api_base: String, timeout: Duration) -> Result<Self, SlackError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .user_agent(concat!("slack-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| SlackError::Http {
                method: "client".to_string(),
                source,
            })?;

        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            http,
        })
    }

    /// Build from config; `None` when no bot token is configured
    pub fn from_config(section: &SlackSection) -> Result<Option<Self>, SlackError> {
        match &section.bot_token {
            Some(token) => Self::new(
                token.clone(),
                section.api_base.clone(),
                Duration::from_secs(section.timeout_secs),
            )
            .map(Some),
            None => Ok(None),
        }
    }

    fn get<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, SlackError> {
        let url = format!("{}/{}", self.api_base, method);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(params)
            .send();
        decode(method, response)
    }

    fn post<T: DeserializeOwned>(&self, method: &str, body: &Value) -> Result<T, SlackError> {
        let url = format!("{}/{}", self.api_base, method);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send();
        decode(method, response)
    }
}

fn transport_error(method: &str, source: reqwest::Error) -> SlackError {
    if source.is_timeout() {
        SlackError::Timeout {
            method: method.to_string(),
        }
    } else {
        SlackError::Http {
            method: method.to_string(),
            source,
        }
    }
}

/// Unwrap the `{ok, error, ...}` envelope and decode the payload
fn decode<T: DeserializeOwned>(
    method: &str,
    response: reqwest::Result<reqwest::blocking::Response>,
) -> Result<T, SlackError> {
    let response = response.map_err(|e| transport_error(method, e))?;

    if response.status().as_u16() == 429 {
        return Err(SlackError::Api {
            method: method.to_string(),
            code: "ratelimited".to_string(),
        });
    }

    let body = response.text().map_err(|e| transport_error(method, e))?;
    let value: Value = serde_json::from_str(&body).map_err(|source| SlackError::Decode {
        method: method.to_string(),
        source,
    })?;

    if value.get("ok").and_then(Value::as_bool) != Some(true) {
        let code = value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error")
            .to_string();
        return Err(SlackError::Api {
            method: method.to_string(),
            code,
        });
    }

    serde_json::from_value(value).map_err(|source| SlackError::Decode {
        method: method.to_string(),
        source,
    })
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    is_private: bool,
    #[serde(default)]
    num_members: Option<u64>,
}

impl From<RawChannel> for Channel {
    fn from(raw: RawChannel) -> Self {
        Channel {
            id: raw.id,
            name: raw.name,
            is_private: raw.is_private,
            num_members: raw.num_members,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChannelsPage {
    #[serde(default)]
    channels: Vec<RawChannel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ChannelInfo {
    channel: RawChannel,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    ts: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    thread_ts: Option<String>,
    #[serde(default)]
    reply_count: Option<usize>,
}

impl RawMessage {
    /// `None` for entries whose `ts` is not a valid timestamp
    fn into_message(self, channel_id: &str) -> Option<Message> {
        let timestamp = parse_ts(&self.ts)?;
        Some(Message {
            id: self.ts,
            channel_id: channel_id.to_string(),
            user_id: self
                .user
                .or(self.bot_id)
                .unwrap_or_else(|| "unknown".to_string()),
            text: self.text,
            timestamp,
            thread_root_id: self.thread_ts,
            reply_count: self.reply_count.unwrap_or(0),
        })
    }
}

#[derive(Debug, Deserialize)]
struct MessagesPage {
    #[serde(default)]
    messages: Vec<RawMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProfile {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    status_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    real_name: Option<String>,
    #[serde(default)]
    tz: Option<String>,
    #[serde(default)]
    is_bot: bool,
    #[serde(default)]
    is_admin: bool,
    #[serde(default)]
    profile: RawProfile,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<RawUser> for SlackUser {
    fn from(raw: RawUser) -> Self {
        SlackUser {
            id: raw.id,
            name: raw.name,
            real_name: non_empty(raw.real_name),
            display_name: non_empty(raw.profile.display_name),
            email: non_empty(raw.profile.email),
            title: non_empty(raw.profile.title),
            status_text: non_empty(raw.profile.status_text),
            timezone: non_empty(raw.tz),
            is_bot: raw.is_bot,
            is_admin: raw.is_admin,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    user: RawUser,
}

#[derive(Debug, Deserialize)]
struct UsersPage {
    #[serde(default)]
    members: Vec<RawUser>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct PostedMessage {
    ts: String,
}

fn next_cursor(meta: Option<ResponseMetadata>) -> Option<String> {
    meta.map(|m| m.next_cursor).filter(|c| !c.is_empty())
}

// =============================================================================
// SlackApi
// =============================================================================

impl SlackApi for SlackClient {
    fn list_channels(&self, limit: usize) -> Result<Vec<Channel>, SlackError> {
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;

        while channels.len() < limit {
            let mut params = vec![
                ("types", "public_channel,private_channel".to_string()),
                ("exclude_archived", "true".to_string()),
                ("limit", PAGE_SIZE.min(limit).to_string()),
            ];
            if let Some(c) = &cursor {
                params.push(("cursor", c.clone()));
            }

            let page: ChannelsPage = self.get("conversations.list", &params)?;
            channels.extend(page.channels.into_iter().map(Channel::from));

            cursor = next_cursor(page.response_metadata);
            if cursor.is_none() {
                break;
            }
        }

        channels.truncate(limit);
        Ok(channels)
    }

    fn channel_info(&self, channel_id: &str) -> Result<Channel, SlackError> {
        let info: ChannelInfo =
            self.get("conversations.info", &[("channel", channel_id.to_string())])?;
        Ok(info.channel.into())
    }

    fn get_channel_history(
        &self,
        channel_id: &str,
        limit: usize,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, SlackError> {
        let mut params = vec![
            ("channel", channel_id.to_string()),
            ("limit", limit.clamp(1, 999).to_string()),
        ];
        if let Some(oldest) = since {
            params.push(("oldest", format_ts(oldest)));
        }
        if let Some(latest) = until {
            params.push(("latest", format_ts(latest)));
        }
        if since.is_some() || until.is_some() {
            params.push(("inclusive", "true".to_string()));
        }

        let page: MessagesPage = self.get("conversations.history", &params)?;
        Ok(page
            .messages
            .into_iter()
            .filter_map(|m| m.into_message(channel_id))
            .collect())
    }

    fn get_thread_replies(
        &self,
        channel_id: &str,
        root_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, SlackError> {
        let params = [
            ("channel", channel_id.to_string()),
            ("ts", root_id.to_string()),
            ("limit", limit.clamp(1, 999).to_string()),
        ];
        let page: MessagesPage = self.get("conversations.replies", &params)?;
        Ok(page
            .messages
            .into_iter()
            .filter_map(|m| m.into_message(channel_id))
            .collect())
    }

    fn get_user_info(&self, user_id: &str) -> Result<SlackUser, SlackError> {
        let info: UserInfo = self.get("users.info", &[("user", user_id.to_string())])?;
        Ok(info.user.into())
    }

    fn list_users(&self, limit: usize) -> Result<Vec<SlackUser>, SlackError> {
        let mut users = Vec::new();
        let mut cursor: Option<String> = None;

        while users.len() < limit {
            let mut params = vec![("limit", PAGE_SIZE.min(limit).to_string())];
            if let Some(c) = &cursor {
                params.push(("cursor", c.clone()));
            }

            let page: UsersPage = self.get("users.list", &params)?;
            users.extend(page.members.into_iter().map(SlackUser::from));

            cursor = next_cursor(page.response_metadata);
            if cursor.is_none() {
                break;
            }
        }

        users.truncate(limit);
        Ok(users)
    }

    fn send_message(&self, channel_id: &str, text: &str) -> Result<String, SlackError> {
        let body = serde_json::json!({ "channel": channel_id, "text": text });
        let posted: PostedMessage = self.post("chat.postMessage", &body)?;
        Ok(posted.ts)
    }
}
