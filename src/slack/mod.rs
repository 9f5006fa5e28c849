//! Slack workspace access
//!
//! "Do X": read channels, history, threads and users; post messages.
//!
//! `SlackApi` is the seam the rest of the crate depends on. `SlackClient` is
//! the Web API implementation; tests substitute in-memory fakes.
//!
//! Message ids are Slack `ts` strings, unique within a channel.

mod internal;

pub use internal::SlackClient;

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::SlackError;

/// A conversation the token can see
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub num_members: Option<u64>,
}

/// A message as read from channel history. Never mutated locally.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Slack `ts`, unique per channel
    pub id: String,
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// `thread_ts`; equals `id` for thread roots
    pub thread_root_id: Option<String>,
    pub reply_count: usize,
}

impl Message {
    /// Thread root this message belongs to (itself when not threaded)
    pub fn root_id(&self) -> &str {
        self.thread_root_id.as_deref().unwrap_or(&self.id)
    }

    /// Whether this message starts a thread with replies
    pub fn has_replies(&self) -> bool {
        self.reply_count > 0 && self.root_id() == self.id
    }

    /// Cache key: message ids are only unique within a channel
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.channel_id, self.id)
    }
}

/// Workspace member profile
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlackUser {
    pub id: String,
    /// Handle (`name` in the API)
    pub name: String,
    pub real_name: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub title: Option<String>,
    pub status_text: Option<String>,
    pub timezone: Option<String>,
    pub is_bot: bool,
    pub is_admin: bool,
}

impl SlackUser {
    /// Name shown in reports: real name, then display name, then handle
    pub fn label(&self) -> &str {
        [&self.real_name, &self.display_name]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.trim().is_empty())
            .unwrap_or(self.name.as_str())
    }

    /// Case-insensitive fragment match against every known name
    pub fn matches_name(&self, fragment: &str) -> bool {
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        std::iter::once(&self.name)
            .chain(self.real_name.iter())
            .chain(self.display_name.iter())
            .any(|n| n.to_lowercase().contains(&needle))
    }
}

/// Slack Web API operations used by the server
pub trait SlackApi: Send + Sync {
    /// Public and private channels visible to the token
    fn list_channels(&self, limit: usize) -> Result<Vec<Channel>, SlackError>;

    fn channel_info(&self, channel_id: &str) -> Result<Channel, SlackError>;

    /// Newest-first history, optionally bounded to `since..=until`
    fn get_channel_history(
        &self,
        channel_id: &str,
        limit: usize,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, SlackError>;

    /// Replies of a thread, root included
    fn get_thread_replies(
        &self,
        channel_id: &str,
        root_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, SlackError>;

    fn get_user_info(&self, user_id: &str) -> Result<SlackUser, SlackError>;

    fn list_users(&self, limit: usize) -> Result<Vec<SlackUser>, SlackError>;

    /// Post a message, returning its `ts`
    fn send_message(&self, channel_id: &str, text: &str) -> Result<String, SlackError>;
}

/// User id → profile lookup built once per search
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: HashMap<String, SlackUser>,
}

impl UserDirectory {
    pub fn from_users(users: impl IntoIterator<Item = SlackUser>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id.clone(), u)).collect(),
        }
    }

    pub fn get(&self, user_id: &str) -> Option<&SlackUser> {
        self.users.get(user_id)
    }

    /// Display label for a user id, falling back to the raw id
    pub fn label<'a>(&'a self, user_id: &'a str) -> &'a str {
        self.users.get(user_id).map(|u| u.label()).unwrap_or(user_id)
    }

    /// Whether `user_id` is the user described by `filter` (id or name fragment)
    pub fn matches(&self, user_id: &str, filter: &str) -> bool {
        let filter = filter.trim().trim_start_matches('@');
        if filter.is_empty() {
            return false;
        }
        if user_id.eq_ignore_ascii_case(filter) {
            return true;
        }
        self.users
            .get(user_id)
            .map(|u| u.matches_name(filter))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Convert a Slack `ts` ("1700000000.123456") to a UTC time
pub fn parse_ts(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = ts.trim().split_once('.').unwrap_or((ts.trim(), ""));
    let secs: i64 = secs.parse().ok()?;
    let frac: String = frac.chars().take(6).collect();
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let micros: u32 = format!("{:0<6}", frac).parse().ok()?;
    DateTime::from_timestamp(secs, micros * 1_000)
}

/// Convert a UTC time to the Slack `ts` format (microsecond precision)
pub fn format_ts(time: DateTime<Utc>) -> String {
    format!("{}.{:06}", time.timestamp(), time.timestamp_subsec_micros())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user(id: &str, name: &str, real: Option<&str>) -> SlackUser {
        SlackUser {
            id: id.to_string(),
            name: name.to_string(),
            real_name: real.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_ts() {
        let t = parse_ts("1700000000.123456").unwrap();
        assert_eq!(t.timestamp(), 1_700_000_000);
        assert_eq!(t.timestamp_subsec_micros(), 123_456);

        assert_eq!(parse_ts("1700000000").unwrap().timestamp(), 1_700_000_000);
        assert_eq!(
            parse_ts("1700000000.5").unwrap().timestamp_subsec_micros(),
            500_000
        );
        assert!(parse_ts("not-a-ts").is_none());
        assert!(parse_ts("1700000000.12ab").is_none());
    }

    #[test]
    fn test_format_ts() {
        let t = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();
        assert_eq!(format_ts(t), "1700000000.000000");
        assert_eq!(parse_ts(&format_ts(t)), Some(t));
    }

    #[test]
    fn test_root_id() {
        let mut msg = Message {
            id: "2.0".into(),
            channel_id: "C1".into(),
            user_id: "U1".into(),
            text: "reply".into(),
            timestamp: parse_ts("2.0").unwrap(),
            thread_root_id: Some("1.0".into()),
            reply_count: 0,
        };
        assert_eq!(msg.root_id(), "1.0");
        assert!(!msg.has_replies());

        msg.thread_root_id = None;
        assert_eq!(msg.root_id(), "2.0");
        assert_eq!(msg.cache_key(), "C1/2.0");
    }

    #[test]
    fn test_user_label_fallbacks() {
        assert_eq!(user("U1", "jdoe", Some("John Doe")).label(), "John Doe");
        assert_eq!(user("U1", "jdoe", Some("  ")).label(), "jdoe");

        let mut u = user("U1", "jdoe", None);
        u.display_name = Some("Johnny".into());
        assert_eq!(u.label(), "Johnny");
    }

    #[test]
    fn test_directory_matches() {
        let dir = UserDirectory::from_users(vec![
            user("U1", "jdoe", Some("John Doe")),
            user("U2", "asmith", Some("Alice Smith")),
        ]);

        assert!(dir.matches("U1", "john"));
        assert!(dir.matches("U1", "@jdoe"));
        assert!(dir.matches("U2", "u2"));
        assert!(!dir.matches("U2", "john"));
        assert!(!dir.matches("U9", "john"));
        assert!(!dir.matches("U1", ""));
        assert_eq!(dir.label("U2"), "Alice Smith");
        assert_eq!(dir.label("U9"), "U9");
    }
}
