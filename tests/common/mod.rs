//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use slack_mcp::embeddings::Embedder;
use slack_mcp::error::{LlmError, SlackError};
use slack_mcp::llm::LanguageModel;
use slack_mcp::slack::{Channel, Message, SlackApi, SlackUser};

/// Wednesday 2024-05-15 14:30 UTC
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 15, 14, 30, 0).unwrap()
}

pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, hour, minute, 0).unwrap()
}

pub fn message(channel: &str, id: &str, user: &str, time: DateTime<Utc>, text: &str) -> Message {
    Message {
        id: id.to_string(),
        channel_id: channel.to_string(),
        user_id: user.to_string(),
        text: text.to_string(),
        timestamp: time,
        thread_root_id: None,
        reply_count: 0,
    }
}

pub fn reply(channel: &str, id: &str, root: &str, user: &str, time: DateTime<Utc>, text: &str) -> Message {
    Message {
        thread_root_id: Some(root.to_string()),
        ..message(channel, id, user, time, text)
    }
}

pub fn user(id: &str, name: &str, real_name: &str) -> SlackUser {
    SlackUser {
        id: id.to_string(),
        name: name.to_string(),
        real_name: Some(real_name.to_string()),
        ..Default::default()
    }
}

/// A workspace held in memory; counts every call
#[derive(Default)]
pub struct FakeWorkspace {
    pub channels: Vec<Channel>,
    pub history: HashMap<String, Vec<Message>>,
    pub users: Vec<SlackUser>,
    pub denied: HashSet<String>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub calls: AtomicUsize,
}

impl FakeWorkspace {
    pub fn add_channel(&mut self, id: &str, name: &str, messages: Vec<Message>) {
        self.channels.push(Channel {
            id: id.to_string(),
            name: name.to_string(),
            is_private: false,
            num_members: Some(3),
        });
        self.history.insert(id.to_string(), messages);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

fn api_error(method: &str, code: &str) -> SlackError {
    SlackError::Api {
        method: method.to_string(),
        code: code.to_string(),
    }
}

impl SlackApi for FakeWorkspace {
    fn list_channels(&self, limit: usize) -> Result<Vec<Channel>, SlackError> {
        self.tick();
        Ok(self.channels.iter().take(limit).cloned().collect())
    }

    fn channel_info(&self, channel_id: &str) -> Result<Channel, SlackError> {
        self.tick();
        self.channels
            .iter()
            .find(|c| c.id == channel_id)
            .cloned()
            .ok_or_else(|| api_error("conversations.info", "channel_not_found"))
    }

    fn get_channel_history(
        &self,
        channel_id: &str,
        limit: usize,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, SlackError> {
        self.tick();
        if self.denied.contains(channel_id) {
            return Err(api_error("conversations.history", "not_in_channel"));
        }
        let mut messages: Vec<Message> = self
            .history
            .get(channel_id)
            .cloned()
            .ok_or_else(|| api_error("conversations.history", "channel_not_found"))?
            .into_iter()
            .filter(|m| since.map_or(true, |s| m.timestamp >= s))
            .filter(|m| until.map_or(true, |u| m.timestamp <= u))
            .collect();
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        messages.truncate(limit);
        Ok(messages)
    }

    fn get_thread_replies(
        &self,
        channel_id: &str,
        root_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, SlackError> {
        self.tick();
        Ok(self
            .history
            .get(channel_id)
            .map(|h| {
                h.iter()
                    .filter(|m| m.root_id() == root_id)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get_user_info(&self, user_id: &str) -> Result<SlackUser, SlackError> {
        self.tick();
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .cloned()
            .ok_or_else(|| api_error("users.info", "user_not_found"))
    }

    fn list_users(&self, limit: usize) -> Result<Vec<SlackUser>, SlackError> {
        self.tick();
        Ok(self.users.iter().take(limit).cloned().collect())
    }

    fn send_message(&self, channel_id: &str, text: &str) -> Result<String, SlackError> {
        self.tick();
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        Ok("1715783400.000200".to_string())
    }
}

/// Answers parse prompts with `parse_answer` and anything else with `summary`
pub struct ScriptedModel {
    pub parse_answer: String,
    pub summary: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(parse_answer: &str, summary: Option<&str>) -> Self {
        Self {
            parse_answer: parse_answer.to_string(),
            summary: summary.map(String::from),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl LanguageModel for ScriptedModel {
    fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt.contains("Return ONLY a JSON object") {
            return Ok(self.parse_answer.clone());
        }
        self.summary
            .clone()
            .ok_or(LlmError::Timeout { secs: 20 })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Two topic axes (release, failure) plus a constant so nothing is a zero vector
pub struct TopicEmbedder;

impl Embedder for TopicEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let text = text.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| text.contains(w)) as u8 as f32;
        Ok(vec![
            has(&["deploy", "rollout", "release", "ship"]),
            has(&["fail", "broke", "broken", "error", "outage"]),
            0.1,
        ])
    }

    fn model_name(&self) -> &str {
        "topic"
    }
}
