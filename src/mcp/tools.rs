//! Tool and resource handlers that wrap single Slack calls
//!
//! Every handler returns display text; Slack failures become an error line.

use serde_json::{json, Value};
use std::collections::HashMap;

use crate::error::SlackError;
use crate::slack::{Channel, Message, SlackApi};

pub const NOT_INITIALIZED: &str =
    "Error: Slack client not initialized. Please set SLACK_BOT_TOKEN environment variable.";

const MESSAGES_DEFAULT: usize = 10;
const MESSAGES_MAX: usize = 50;
const SEARCH_DEFAULT: usize = 10;
const SEARCH_MAX: usize = 20;
const SEARCH_CHANNELS: usize = 20;
const SEARCH_HISTORY: usize = 50;
const CHANNEL_LIST_LIMIT: usize = 1000;

/// Clamp a requested count into `1..=max`, `default` when absent
pub fn clamp_limit(requested: Option<u64>, default: usize, max: usize) -> usize {
    requested
        .map(|n| usize::try_from(n).unwrap_or(max))
        .unwrap_or(default)
        .clamp(1, max)
}

fn describe_error(action: &str, e: &SlackError) -> String {
    match e.code() {
        Some(code) => format!("Slack API error: {}", code),
        None => format!("Error {}: {}", action, e),
    }
}

fn format_time(message: &Message) -> String {
    message.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Sender names for `user_ids`, one lookup per distinct id
fn resolve_names<'a>(
    slack: &dyn SlackApi,
    user_ids: impl Iterator<Item = &'a str>,
) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for id in user_ids {
        if names.contains_key(id) {
            continue;
        }
        let label = slack
            .get_user_info(id)
            .map(|u| u.label().to_string())
            .unwrap_or_else(|_| id.to_string());
        names.insert(id.to_string(), label);
    }
    names
}

pub fn render_channels(channels: &[Channel]) -> String {
    if channels.is_empty() {
        return "No channels found or bot doesn't have access to any channels.".to_string();
    }
    let mut out = String::from("Available Slack channels:\n");
    for channel in channels {
        let marker = if channel.is_private { "private" } else { "public" };
        let members = channel
            .num_members
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        out.push_str(&format!(
            "[{}] #{} (ID: {}, Members: {})\n",
            marker, channel.name, channel.id, members
        ));
    }
    out
}

pub fn list_channels(slack: &dyn SlackApi) -> String {
    match slack.list_channels(CHANNEL_LIST_LIMIT) {
        Ok(channels) => render_channels(&channels),
        Err(e) => describe_error("listing channels", &e),
    }
}

pub fn channel_messages(slack: &dyn SlackApi, channel_id: &str, limit: Option<u64>) -> String {
    let limit = clamp_limit(limit, MESSAGES_DEFAULT, MESSAGES_MAX);
    let name = match slack.channel_info(channel_id) {
        Ok(channel) => channel.name,
        Err(e) => return describe_error("getting messages", &e),
    };
    let mut messages = match slack.get_channel_history(channel_id, limit, None, None) {
        Ok(messages) => messages,
        Err(e) => return describe_error("getting messages", &e),
    };
    if messages.is_empty() {
        return format!("No messages found in #{}.", name);
    }

    messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    let names = resolve_names(slack, messages.iter().map(|m| m.user_id.as_str()));

    let mut out = format!(
        "Recent messages from #{} (showing {} messages):\n\n",
        name,
        messages.len()
    );
    for message in &messages {
        out.push_str(&format!(
            "[{}] {}: {}\n",
            format_time(message),
            names.get(&message.user_id).unwrap_or(&message.user_id),
            message.text
        ));
        if message.thread_root_id.is_some() {
            out.push_str("  └─ (part of thread)\n");
        }
    }
    out
}

pub fn search_messages(
    slack: &dyn SlackApi,
    query: &str,
    channel_id: Option<&str>,
    limit: Option<u64>,
) -> String {
    let limit = clamp_limit(limit, SEARCH_DEFAULT, SEARCH_MAX);
    let needle = query.to_lowercase();

    let channels: Vec<(String, Option<String>)> = match channel_id {
        Some(id) => vec![(id.to_string(), None)],
        None => match slack.list_channels(SEARCH_CHANNELS) {
            Ok(channels) => channels.into_iter().map(|c| (c.id, Some(c.name))).collect(),
            Err(_) => {
                return "Error: Unable to access channels. Bot needs to be invited to channels."
                    .to_string()
            }
        },
    };

    let mut matches: Vec<(String, Message)> = Vec::new();
    'channels: for (id, name) in channels {
        let name = match name {
            Some(name) => name,
            None => match slack.channel_info(&id) {
                Ok(channel) => channel.name,
                Err(e) => {
                    tracing::debug!(channel = %id, "skipping channel: {e}");
                    continue;
                }
            },
        };
        let history = match slack.get_channel_history(&id, SEARCH_HISTORY, None, None) {
            Ok(history) => history,
            Err(e) => {
                tracing::debug!(channel = %id, "skipping channel: {e}");
                continue;
            }
        };
        for message in history {
            if message.text.to_lowercase().contains(&needle) {
                matches.push((name.clone(), message));
                if matches.len() >= limit {
                    break 'channels;
                }
            }
        }
    }

    if matches.is_empty() {
        return format!(
            "No messages found matching '{}'. Note: Bot can only search channels it has been invited to.",
            query
        );
    }

    matches.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp));
    let names = resolve_names(slack, matches.iter().map(|(_, m)| m.user_id.as_str()));

    let mut out = format!(
        "Search results for '{}' (showing {} results):\n\n",
        query,
        matches.len()
    );
    for (channel, message) in &matches {
        out.push_str(&format!(
            "[{}] #{} - {}: {}\n\n",
            format_time(message),
            channel,
            names.get(&message.user_id).unwrap_or(&message.user_id),
            message.text
        ));
    }
    out
}

pub fn user_info(slack: &dyn SlackApi, user_id: &str) -> String {
    let user = match slack.get_user_info(user_id) {
        Ok(user) => user,
        Err(e) => return describe_error("getting user info", &e),
    };
    let or_na = |field: &Option<String>| field.clone().unwrap_or_else(|| "N/A".to_string());

    format!(
        "User Information for {}:\nReal Name: {}\nDisplay Name: {}\nEmail: {}\nTitle: {}\nStatus: {}\nIs Bot: {}\nIs Admin: {}\nTimezone: {}\n",
        user.name,
        or_na(&user.real_name),
        or_na(&user.display_name),
        or_na(&user.email),
        or_na(&user.title),
        or_na(&user.status_text),
        user.is_bot,
        user.is_admin,
        or_na(&user.timezone),
    )
}

pub fn send_message(slack: &dyn SlackApi, channel_id: &str, text: &str) -> String {
    match slack.send_message(channel_id, text) {
        Ok(ts) => format!(
            "Message sent successfully to channel {}. Message timestamp: {}",
            channel_id, ts
        ),
        Err(e) => describe_error("sending message", &e),
    }
}

pub fn status(initialized: bool) -> String {
    if initialized {
        "Slack client initialized and ready".to_string()
    } else {
        "Slack client not initialized - set SLACK_BOT_TOKEN".to_string()
    }
}

/// `tools/list` payload
pub fn tool_definitions() -> Value {
    json!({
        "tools": [
            {
                "name": "slack_list_channels",
                "description": "List all Slack channels the bot has access to.",
                "inputSchema": { "type": "object", "properties": {} }
            },
            {
                "name": "slack_get_channel_messages",
                "description": "Get recent messages from a Slack channel, oldest first.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "channel_id": { "type": "string", "description": "Channel ID (e.g. C024BE91L)" },
                        "limit": { "type": "integer", "description": "Number of messages (default: 10, max: 50)", "default": 10 }
                    },
                    "required": ["channel_id"]
                }
            },
            {
                "name": "slack_search_messages",
                "description": "Find messages containing a literal text fragment across accessible channels.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Text to look for (case-insensitive)" },
                        "channel_id": { "type": "string", "description": "Only search this channel" },
                        "limit": { "type": "integer", "description": "Maximum results (default: 10, max: 20)", "default": 10 }
                    },
                    "required": ["query"]
                }
            },
            {
                "name": "slack_get_user_info",
                "description": "Get profile information about a Slack user.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "user_id": { "type": "string", "description": "User ID (e.g. U024BE7LH)" }
                    },
                    "required": ["user_id"]
                }
            },
            {
                "name": "slack_send_message",
                "description": "Send a message to a Slack channel.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "channel_id": { "type": "string", "description": "Channel ID" },
                        "text": { "type": "string", "description": "Message text" }
                    },
                    "required": ["channel_id", "text"]
                }
            },
            {
                "name": "slack_smart_search",
                "description": "Search Slack with a natural-language request, e.g. \"What did John say about deployment yesterday?\" or \"Find decisions made about the mobile app\". Understands time phrases, people, channels, decisions/questions/issues and tone; returns ranked results grouped by conversation with an optional summary.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Natural-language search request" },
                        "channel_id": { "type": "string", "description": "Only search this channel" },
                        "max_results": { "type": "integer", "description": "Maximum matching messages (default: 10)", "default": 10 },
                        "include_summary": { "type": "boolean", "description": "Add a short summary of the results (default: true)", "default": true }
                    },
                    "required": ["query"]
                }
            }
        ]
    })
}

/// `resources/list` payload
pub fn resource_definitions() -> Value {
    json!({
        "resources": [
            {
                "uri": "slack://channels",
                "name": "Slack channels",
                "description": "Channels the bot can access",
                "mimeType": "text/plain"
            },
            {
                "uri": "slack://status",
                "name": "Slack status",
                "description": "Whether the Slack client is configured",
                "mimeType": "text/plain"
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack::SlackUser;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex;

    struct FakeSlack {
        sent: Mutex<Vec<(String, String)>>,
    }

    fn message(channel: &str, id: &str, user: &str, minute: u32, text: &str) -> Message {
        Message {
            id: id.into(),
            channel_id: channel.into(),
            user_id: user.into(),
            text: text.into(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 14, 9, minute, 0).unwrap(),
            thread_root_id: None,
            reply_count: 0,
        }
    }

    impl SlackApi for FakeSlack {
        fn list_channels(&self, _limit: usize) -> Result<Vec<Channel>, SlackError> {
            Ok(vec![
                Channel {
                    id: "C1".into(),
                    name: "general".into(),
                    is_private: false,
                    num_members: Some(12),
                },
                Channel {
                    id: "C2".into(),
                    name: "secret".into(),
                    is_private: true,
                    num_members: None,
                },
            ])
        }

        fn channel_info(&self, channel_id: &str) -> Result<Channel, SlackError> {
            self.list_channels(10)?
                .into_iter()
                .find(|c| c.id == channel_id)
                .ok_or(SlackError::Api {
                    method: "conversations.info".into(),
                    code: "channel_not_found".into(),
                })
        }

        fn get_channel_history(
            &self,
            channel_id: &str,
            limit: usize,
            _since: Option<DateTime<Utc>>,
            _until: Option<DateTime<Utc>>,
        ) -> Result<Vec<Message>, SlackError> {
            let all = match channel_id {
                "C1" => vec![
                    message("C1", "3.0", "U1", 3, "Deploy finished"),
                    message("C1", "2.0", "U2", 2, "lunch?"),
                    message("C1", "1.0", "U1", 1, "starting deploy"),
                ],
                _ => {
                    return Err(SlackError::Api {
                        method: "conversations.history".into(),
                        code: "not_in_channel".into(),
                    })
                }
            };
            Ok(all.into_iter().take(limit).collect())
        }

        fn get_thread_replies(
            &self,
            _channel_id: &str,
            _root_id: &str,
            _limit: usize,
        ) -> Result<Vec<Message>, SlackError> {
            Ok(Vec::new())
        }

        fn get_user_info(&self, user_id: &str) -> Result<SlackUser, SlackError> {
            match user_id {
                "U1" => Ok(SlackUser {
                    id: "U1".into(),
                    name: "jane".into(),
                    real_name: Some("Jane Doe".into()),
                    email: Some("jane@example.com".into()),
                    ..Default::default()
                }),
                _ => Err(SlackError::Api {
                    method: "users.info".into(),
                    code: "user_not_found".into(),
                }),
            }
        }

        fn list_users(&self, _limit: usize) -> Result<Vec<SlackUser>, SlackError> {
            Ok(Vec::new())
        }

        fn send_message(&self, channel_id: &str, text: &str) -> Result<String, SlackError> {
            self.sent
                .lock()
                .unwrap()
                .push((channel_id.to_string(), text.to_string()));
            Ok("1715677200.000100".to_string())
        }
    }

    fn fake() -> FakeSlack {
        FakeSlack {
            sent: Mutex::new(Vec::new()),
        }
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None, 10, 50), 10);
        assert_eq!(clamp_limit(Some(500), 10, 50), 50);
        assert_eq!(clamp_limit(Some(0), 10, 50), 1);
    }

    #[test]
    fn test_list_channels_marks_privacy() {
        let out = list_channels(&fake());
        assert!(out.contains("[public] #general (ID: C1, Members: 12)"));
        assert!(out.contains("[private] #secret (ID: C2, Members: ?)"));
        assert_eq!(
            render_channels(&[]),
            "No channels found or bot doesn't have access to any channels."
        );
    }

    #[test]
    fn test_channel_messages_oldest_first_with_names() {
        let out = channel_messages(&fake(), "C1", Some(2));
        assert!(out.starts_with("Recent messages from #general (showing 2 messages):"));
        let lunch = out.find("U2: lunch?").unwrap();
        let deploy = out.find("Jane Doe: Deploy finished").unwrap();
        assert!(lunch < deploy);
    }

    #[test]
    fn test_channel_messages_errors() {
        assert_eq!(channel_messages(&fake(), "C9", None), "Slack API error: channel_not_found");
        assert_eq!(channel_messages(&fake(), "C2", None), "Slack API error: not_in_channel");
    }

    #[test]
    fn test_search_messages_substring_newest_first() {
        let out = search_messages(&fake(), "DEPLOY", None, None);
        assert!(out.starts_with("Search results for 'DEPLOY' (showing 2 results):"));
        let newer = out.find("Deploy finished").unwrap();
        let older = out.find("starting deploy").unwrap();
        assert!(newer < older);
        assert!(out.contains("#general - Jane Doe"));

        let none = search_messages(&fake(), "kubernetes", Some("C1"), Some(5));
        assert!(none.starts_with("No messages found matching 'kubernetes'."));
    }

    #[test]
    fn test_user_info_and_send() {
        let out = user_info(&fake(), "U1");
        assert!(out.starts_with("User Information for jane:"));
        assert!(out.contains("Email: jane@example.com"));
        assert!(out.contains("Title: N/A"));
        assert_eq!(user_info(&fake(), "U9"), "Slack API error: user_not_found");

        let slack = fake();
        let out = send_message(&slack, "C1", "hello");
        assert!(out.ends_with("Message timestamp: 1715677200.000100"));
        assert_eq!(slack.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_tool_definitions_cover_every_tool() {
        let tools = tool_definitions();
        let names: Vec<&str> = tools["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names.len(), 6);
        assert!(names.contains(&"slack_smart_search"));
    }
}
