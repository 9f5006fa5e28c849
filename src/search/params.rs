//! Structured search parameters extracted from a natural-language query

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

/// Inclusive time window with the phrase it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Human label ("yesterday", "last 3 days", ...)
    pub label: String,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}

/// What kind of message the user is looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    Decision,
    Question,
    Issue,
    General,
}

impl ContentType {
    /// Detection order for rule-based parsing
    pub const ALL: [ContentType; 3] = [
        ContentType::Decision,
        ContentType::Question,
        ContentType::Issue,
    ];

    /// Lenient parse of model output ("decisions", "bug", ...)
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if s == "general" || s == "any" {
            return Some(ContentType::General);
        }
        Self::ALL
            .into_iter()
            .find(|ct| ct.as_str() == s || ct.family().contains(&s.as_str()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Decision => "decision",
            ContentType::Question => "question",
            ContentType::Issue => "issue",
            ContentType::General => "general",
        }
    }

    /// Words that signal this kind of message
    pub fn family(&self) -> &'static [&'static str] {
        match self {
            ContentType::Decision => &[
                "decision",
                "decisions",
                "decide",
                "decided",
                "deciding",
                "agreed",
                "agreement",
                "conclusion",
                "concluded",
                "chose",
                "chosen",
                "approved",
            ],
            ContentType::Question => &[
                "question",
                "questions",
                "asked",
                "asking",
                "ask",
                "wondering",
                "anyone know",
            ],
            ContentType::Issue => &[
                "issue",
                "issues",
                "problem",
                "problems",
                "bug",
                "bugs",
                "broken",
                "broke",
                "error",
                "errors",
                "failure",
                "failed",
                "failing",
                "outage",
                "incident",
            ],
            ContentType::General => &[],
        }
    }

    /// First content type whose family appears in `words`
    pub fn detect(words: &[String]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|ct| words.iter().any(|w| ct.family().contains(&w.as_str())))
    }

    /// Whether a message text (lowercased) shows this content type
    pub fn appears_in(&self, text_lower: &str) -> bool {
        match self {
            ContentType::General => false,
            ContentType::Question if text_lower.contains('?') => true,
            _ => contains_any_word(text_lower, self.family()),
        }
    }
}

/// Tone the user is looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Concerned,
}

impl Sentiment {
    pub const ALL: [Sentiment; 4] = [
        Sentiment::Concerned,
        Sentiment::Negative,
        Sentiment::Positive,
        Sentiment::Neutral,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s || st.family().contains(&s.as_str()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Concerned => "concerned",
        }
    }

    pub fn family(&self) -> &'static [&'static str] {
        match self {
            Sentiment::Concerned => &[
                "concern",
                "concerns",
                "concerned",
                "worried",
                "worry",
                "worries",
                "anxious",
                "nervous",
                "risk",
                "risky",
                "unclear",
                "confused",
            ],
            Sentiment::Negative => &[
                "frustrated",
                "frustrating",
                "annoyed",
                "angry",
                "unhappy",
                "disappointed",
                "complaint",
                "complaints",
                "terrible",
                "awful",
            ],
            Sentiment::Positive => &[
                "excited",
                "happy",
                "great",
                "awesome",
                "love",
                "glad",
                "kudos",
                "congrats",
                "amazing",
                "excellent",
            ],
            Sentiment::Neutral => &["neutral"],
        }
    }

    pub fn detect(words: &[String]) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|st| words.iter().any(|w| st.family().contains(&w.as_str())))
    }

    /// Words that decide whether this tone applies; for neutral that is every tone word
    pub fn is_tone_word(&self, word: &str) -> bool {
        match self {
            Sentiment::Neutral => Self::ALL.iter().any(|s| s.family().contains(&word)),
            _ => self.family().contains(&word),
        }
    }

    /// Neutral matches text carrying none of the other tones
    pub fn appears_in(&self, text_lower: &str) -> bool {
        match self {
            Sentiment::Neutral => Self::ALL
                .into_iter()
                .filter(|s| *s != Sentiment::Neutral)
                .all(|s| !contains_any_word(text_lower, s.family())),
            _ => contains_any_word(text_lower, self.family()),
        }
    }
}

/// Word-boundary match of any term (terms may contain spaces)
fn contains_any_word(text_lower: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| {
        text_lower.match_indices(term).any(|(i, _)| {
            let before = text_lower[..i].chars().next_back();
            let after = text_lower[i + term.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
    })
}

/// Parsed query. Built once by the parser and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub keywords: BTreeSet<String>,
    pub time_range: Option<TimeRange>,
    /// User id or display-name fragment
    pub user_filter: Option<String>,
    pub content_type: Option<ContentType>,
    pub sentiment: Option<Sentiment>,
    /// Channel id or name (without `#`)
    pub channel_hint: Option<String>,
}

impl SearchParams {
    /// Keywords only, every optional field unset
    pub fn from_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Keywords joined into a single query string (for embeddings)
    pub fn keyword_query(&self) -> String {
        self.keywords.iter().cloned().collect::<Vec<_>>().join(" ")
    }

    /// "time: yesterday", "user: John", ... for report headers
    pub fn describe_filters(&self) -> Vec<String> {
        let mut filters = Vec::new();
        if let Some(range) = &self.time_range {
            filters.push(format!("time: {}", range.label));
        }
        if let Some(user) = &self.user_filter {
            filters.push(format!("user: {}", user));
        }
        if let Some(ct) = self.content_type.filter(|ct| *ct != ContentType::General) {
            filters.push(format!("type: {}", ct.as_str()));
        }
        if let Some(sentiment) = self.sentiment {
            filters.push(format!("tone: {}", sentiment.as_str()));
        }
        if let Some(channel) = &self.channel_hint {
            filters.push(format!("channel: #{}", channel));
        }
        filters
    }
}
