//! Candidate retriever: bounded window of channel history to search over

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use super::params::SearchParams;
use crate::config::SearchSection;
use crate::error::{RetrievalError, SlackError};
use crate::slack::{Channel, Message, SlackApi};

/// Channels fetched when resolving a `#name` hint
const HINT_LOOKUP_LIMIT: usize = 1000;

/// Retrieved messages plus the channel names seen on the way
#[derive(Debug, Clone, Default)]
pub struct Candidates {
    pub messages: Vec<Message>,
    /// channel id → name, for channels that came from a listing
    pub channel_names: HashMap<String, String>,
}

struct Target {
    id: String,
    name: Option<String>,
}

impl From<Channel> for Target {
    fn from(channel: Channel) -> Self {
        Self {
            id: channel.id,
            name: Some(channel.name),
        }
    }
}

/// Slack channel ids: `C`, `G` or `D` followed by uppercase alphanumerics
fn looks_like_channel_id(s: &str) -> bool {
    s.len() >= 9
        && s.starts_with(['C', 'G', 'D'])
        && s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

pub struct CandidateRetriever<'a> {
    slack: &'a dyn SlackApi,
    config: &'a SearchSection,
}

impl<'a> CandidateRetriever<'a> {
    pub fn new(slack: &'a dyn SlackApi, config: &'a SearchSection) -> Self {
        Self { slack, config }
    }

    /// At most `limit` messages from `scope`, or from every accessible channel
    pub fn retrieve(
        &self,
        params: &SearchParams,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Message>, RetrievalError> {
        Ok(self.collect(params, scope, limit)?.messages)
    }

    /// Like `retrieve`, also returning channel names
    pub fn collect(
        &self,
        params: &SearchParams,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Candidates, RetrievalError> {
        let mut candidates = Candidates::default();
        if limit == 0 {
            return Ok(candidates);
        }

        let (targets, single) = self.targets(params, scope)?;
        for target in &targets {
            if let Some(name) = &target.name {
                candidates
                    .channel_names
                    .insert(target.id.clone(), name.clone());
            }
        }

        let window = params.time_range.as_ref().map(|r| (r.start, r.end));
        let mut failed = 0;
        for target in &targets {
            let remaining = limit - candidates.messages.len();
            if remaining == 0 {
                break;
            }
            match self.fetch_channel(params, &target.id, window, remaining) {
                Ok(mut messages) => candidates.messages.append(&mut messages),
                Err(source) if single => {
                    return Err(RetrievalError::Channel {
                        channel: target.id.clone(),
                        source,
                    })
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(channel = %target.id, "skipping channel: {e}");
                }
            }
        }

        if !targets.is_empty() && failed == targets.len() {
            return Err(RetrievalError::AllChannelsFailed { failed });
        }

        candidates.messages.truncate(limit);
        tracing::debug!(
            channels = targets.len(),
            failed,
            candidates = candidates.messages.len(),
            "retrieved candidates"
        );
        Ok(candidates)
    }

    /// Channels to scan, and whether this is a single explicit target
    fn targets(
        &self,
        params: &SearchParams,
        scope: Option<&str>,
    ) -> Result<(Vec<Target>, bool), RetrievalError> {
        if let Some(id) = scope.map(str::trim).filter(|s| !s.is_empty()) {
            return Ok((vec![self.single_target(id)], true));
        }

        if let Some(hint) = params.channel_hint.as_deref() {
            if looks_like_channel_id(hint) {
                return Ok((vec![self.single_target(hint)], true));
            }

            let channels = self
                .slack
                .list_channels(HINT_LOOKUP_LIMIT)
                .map_err(RetrievalError::ChannelList)?;
            let wanted = hint.trim_start_matches('#');
            if let Some(found) = channels
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(wanted))
            {
                return Ok((vec![Target::from(found.clone())], true));
            }

            tracing::warn!(hint = %wanted, "channel hint not found, scanning all channels");
            let all = channels
                .into_iter()
                .take(self.config.channel_scan_limit)
                .map(Target::from)
                .collect();
            return Ok((all, false));
        }

        let channels = self
            .slack
            .list_channels(self.config.channel_scan_limit)
            .map_err(RetrievalError::ChannelList)?;
        let all = channels
            .into_iter()
            .take(self.config.channel_scan_limit)
            .map(Target::from)
            .collect();
        Ok((all, false))
    }

    /// Explicit channel id; its name is looked up best-effort
    fn single_target(&self, id: &str) -> Target {
        match self.slack.channel_info(id) {
            Ok(channel) => Target::from(channel),
            Err(e) => {
                tracing::debug!(channel = %id, "channel info unavailable: {e}");
                Target {
                    id: id.to_string(),
                    name: None,
                }
            }
        }
    }

    fn fetch_channel(
        &self,
        params: &SearchParams,
        channel_id: &str,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
        remaining: usize,
    ) -> Result<Vec<Message>, SlackError> {
        let per_channel = self.config.history_per_channel.min(remaining);
        let (since, until) = window.unzip();
        let history = self
            .slack
            .get_channel_history(channel_id, per_channel, since, until)?;

        let keep = |m: &Message| {
            !m.text.trim().is_empty()
                && params
                    .time_range
                    .as_ref()
                    .map_or(true, |r| r.contains(m.timestamp))
        };

        let mut messages: Vec<Message> = history.into_iter().filter(|m| keep(m)).collect();
        if self.config.expand_threads {
            self.expand_threads(channel_id, &mut messages, remaining, keep);
        }
        messages.truncate(remaining);
        Ok(messages)
    }

    /// Append replies of thread roots; failures only lose the replies
    fn expand_threads(
        &self,
        channel_id: &str,
        messages: &mut Vec<Message>,
        remaining: usize,
        keep: impl Fn(&Message) -> bool,
    ) {
        let mut seen: HashSet<String> = messages.iter().map(|m| m.id.clone()).collect();
        let roots: Vec<String> = messages
            .iter()
            .filter(|m| m.has_replies())
            .map(|m| m.id.clone())
            .collect();

        for root in roots {
            if messages.len() >= remaining {
                break;
            }
            let budget = remaining - messages.len() + 1;
            match self.slack.get_thread_replies(channel_id, &root, budget) {
                Ok(replies) => {
                    for reply in replies {
                        if keep(&reply) && seen.insert(reply.id.clone()) {
                            messages.push(reply);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(channel = %channel_id, thread = %root, "thread replies unavailable: {e}")
                }
            }
        }
    }
}
