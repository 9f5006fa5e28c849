//! Conversation grouper: clusters ranked matches by thread

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::ranker::ScoredMatch;

/// Matches sharing a channel and thread root, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    pub channel_id: String,
    pub root_message_id: String,
    pub members: Vec<ScoredMatch>,
}

impl Conversation {
    pub fn max_score(&self) -> f32 {
        self.members
            .iter()
            .map(|m| m.score)
            .fold(0.0, f32::max)
    }

    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.members.iter().map(|m| m.message.timestamp).max()
    }

    /// Highest-scoring member (earliest on ties)
    pub fn best(&self) -> Option<&ScoredMatch> {
        self.members
            .iter()
            .reduce(|best, m| if m.score > best.score { m } else { best })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Group by `(channel, thread root or own id)`
///
/// Members are ordered by timestamp ascending, conversations by best score
/// descending (newer activity first on ties). Grouping the flattened output
/// again yields the same conversations.
pub fn group(matches: Vec<ScoredMatch>) -> Vec<Conversation> {
    let mut buckets: BTreeMap<(String, String), Vec<ScoredMatch>> = BTreeMap::new();
    for m in matches {
        let key = (m.message.channel_id.clone(), m.message.root_id().to_string());
        buckets.entry(key).or_default().push(m);
    }

    let mut conversations: Vec<Conversation> = buckets
        .into_iter()
        .map(|((channel_id, root_message_id), mut members)| {
            members.sort_by(|a, b| {
                a.message
                    .timestamp
                    .cmp(&b.message.timestamp)
                    .then_with(|| a.message.id.cmp(&b.message.id))
            });
            members.dedup_by(|a, b| a.message.id == b.message.id);
            Conversation {
                channel_id,
                root_message_id,
                members,
            }
        })
        .collect();

    conversations.sort_by(compare_conversations);
    conversations
}

fn compare_conversations(a: &Conversation, b: &Conversation) -> Ordering {
    b.max_score()
        .total_cmp(&a.max_score())
        .then_with(|| b.latest().cmp(&a.latest()))
        .then_with(|| a.channel_id.cmp(&b.channel_id))
        .then_with(|| a.root_message_id.cmp(&b.root_message_id))
}

/// Total number of matches across conversations
pub fn match_count(conversations: &[Conversation]) -> usize {
    conversations.iter().map(Conversation::len).sum()
}
