//! Query parser: natural language → `SearchParams`
//!
//! Two paths share one contract and never fail:
//! - rule-based: time phrases, user references, channel hints, content-type
//!   and tone word lists, stopword-filtered keywords
//! - LLM-backed: asks the model for JSON, then validates each field on its own
//!   and falls back to the rule-based value for anything missing or invalid

use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use super::params::{ContentType, SearchParams, Sentiment, TimeRange};
use super::timeframe;
use crate::error::LlmError;
use crate::llm::{extract_json_object, LanguageModel, ModelCapability};

/// Not an error: records why the model's answer was not used as-is
#[derive(Debug)]
pub enum ParseDegradation {
    /// Rule-based capability selected
    LlmUnavailable,
    /// The model call failed (timeout, HTTP, empty)
    LlmFailed(LlmError),
    /// No usable JSON object in the answer
    MalformedResponse(String),
    /// JSON parsed but these fields came from the rules
    FieldsFilled(Vec<&'static str>),
}

impl fmt::Display for ParseDegradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseDegradation::LlmUnavailable => write!(f, "no language model, rule-based parse"),
            ParseDegradation::LlmFailed(e) => write!(f, "model call failed: {e}"),
            ParseDegradation::MalformedResponse(why) => write!(f, "malformed model output: {why}"),
            ParseDegradation::FieldsFilled(fields) => {
                write!(f, "rule-based values used for: {}", fields.join(", "))
            }
        }
    }
}

const STOPWORDS: &[&str] = &[
    "a", "about", "all", "also", "an", "and", "any", "anyone", "anything", "are", "around",
    "at", "be", "been", "being", "between", "but", "by", "can", "could", "did", "discuss",
    "discussed", "discussing", "discussion", "discussions", "do", "does", "during", "find",
    "for", "from", "get", "give", "had", "has", "have", "he", "her", "here", "him", "his",
    "how", "i", "in", "into", "is", "it", "its", "just", "list", "look", "made", "make",
    "me", "mention", "mentioned", "message", "messages", "my", "no", "not", "of", "on",
    "or", "our", "over", "people", "please", "post", "posted", "regarding", "said", "say",
    "says", "search", "she", "should", "show", "since", "so", "some", "someone", "tell",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
    "those", "to", "up", "us", "was", "we", "were", "what", "when", "where", "which", "who",
    "why", "will", "with", "would", "wrote", "you", "your",
];

fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Capitalised like names but never people
const CALENDAR_WORDS: &[&str] = &[
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
    "january", "february", "march", "april", "may", "june", "july", "august",
    "september", "october", "november", "december",
];

/// Lowercased word tokens (letters, digits, `-`, `_`)
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .map(|t| t.trim_matches(|c| c == '-' || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Keywords for a query no pattern could make sense of
///
/// Empty only when the query has no non-whitespace characters.
pub fn fallback_keywords(query: &str) -> BTreeSet<String> {
    let tokens = tokenize(query);
    let significant: BTreeSet<String> = tokens
        .iter()
        .filter(|t| t.chars().count() > 1 && !is_stopword(t))
        .cloned()
        .collect();
    if !significant.is_empty() {
        return significant;
    }
    if !tokens.is_empty() {
        return tokens.into_iter().collect();
    }
    let trimmed = query.trim().to_lowercase();
    if trimmed.is_empty() {
        BTreeSet::new()
    } else {
        BTreeSet::from([trimmed])
    }
}

fn channel_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<#([A-Z0-9]+)(?:\|[^>]*)?>|(?:^|\s)#([\w][\w.-]*)")
            .expect("Invalid channel reference regex")
    })
}

fn user_said_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\bwhat\s+(?:did|has|have)\s+@?([\w.]+)\s+(?:say|said|write|written|post|posted|mention|mentioned)\b|(?i)\bwhat\s+@?([\w.]+)\s+(?:said|wrote|posted|mentioned)\b",
        )
        .expect("Invalid user reference regex")
    })
}

fn user_mention_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<@([A-Z0-9]+)(?:\|[^>]*)?>|(?:^|\s)@([\w.]+)")
            .expect("Invalid mention regex")
    })
}

fn user_from_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:from|by)\s+([\w.]+)").expect("Invalid from/by regex")
    })
}

/// First capture group that matched
fn first_group<'t>(caps: &regex::Captures<'t>) -> Option<regex::Match<'t>> {
    caps.iter().skip(1).flatten().next()
}

/// Cut `range` out of `text`, leaving a space
fn cut(text: &str, range: std::ops::Range<usize>) -> String {
    format!("{} {}", &text[..range.start], &text[range.end..])
}

fn extract_channel(text: &str) -> (Option<String>, String) {
    match channel_ref_regex().captures(text) {
        Some(caps) => {
            let hint = first_group(&caps).map(|m| m.as_str().to_string());
            let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
            (hint, cut(text, whole))
        }
        None => (None, text.to_string()),
    }
}

fn extract_user(text: &str) -> (Option<String>, String) {
    if let Some(caps) = user_said_regex().captures(text) {
        if let (Some(name), Some(whole)) = (first_group(&caps), caps.get(0)) {
            if !is_stopword(&name.as_str().to_lowercase()) {
                return (Some(name.as_str().to_string()), cut(text, whole.range()));
            }
        }
    }

    if let Some(caps) = user_mention_regex().captures(text) {
        if let (Some(name), Some(whole)) = (first_group(&caps), caps.get(0)) {
            return (Some(name.as_str().to_string()), cut(text, whole.range()));
        }
    }

    // "from"/"by" only introduce a person when the name is capitalised
    // ("from John") so "errors from staging" keeps its keyword.
    // A capitalised "From" mid-query means a title-cased phrase.
    for caps in user_from_regex().captures_iter(text) {
        let (Some(name), Some(whole)) = (caps.get(1), caps.get(0)) else {
            continue;
        };
        let title_cased =
            whole.start() > 0 && whole.as_str().chars().next().is_some_and(char::is_uppercase);
        let candidate = name.as_str();
        let lower = candidate.to_lowercase();
        let capitalised = candidate.chars().next().is_some_and(char::is_uppercase);
        if capitalised
            && !title_cased
            && !is_stopword(&lower)
            && !CALENDAR_WORDS.contains(&lower.as_str())
        {
            return (Some(candidate.to_string()), cut(text, whole.range()));
        }
    }

    (None, text.to_string())
}

/// Rule-based parse against reference time `now`
pub fn parse_rules(query: &str, now: DateTime<Utc>) -> SearchParams {
    if query.trim().is_empty() {
        return SearchParams::default();
    }

    let (channel_hint, text) = extract_channel(query);
    let (time_range, text) = timeframe::extract(&text, now);
    let (user_filter, text) = extract_user(&text);

    let words = tokenize(&text);
    let content_type = ContentType::detect(&words);
    let sentiment = Sentiment::detect(&words);

    let user_lower = user_filter.as_deref().map(str::to_lowercase);
    let mut keywords: BTreeSet<String> = words
        .into_iter()
        .filter(|w| w.chars().count() > 2 && !is_stopword(w))
        .filter(|w| !content_type.is_some_and(|ct| ct.family().contains(&w.as_str())))
        .filter(|w| !sentiment.is_some_and(|s| s.is_tone_word(w)))
        .filter(|w| user_lower.as_deref() != Some(w.as_str()))
        .collect();

    if keywords.is_empty() {
        keywords = fallback_keywords(query);
    }

    SearchParams {
        keywords,
        time_range,
        user_filter,
        content_type,
        sentiment,
        channel_hint,
    }
}

/// Turns free-form queries into `SearchParams`
#[derive(Debug, Clone, Default)]
pub struct QueryParser {
    capability: ModelCapability,
}

impl QueryParser {
    pub fn new(capability: ModelCapability) -> Self {
        Self { capability }
    }

    /// Parse against the current time
    pub fn parse(&self, query: &str) -> SearchParams {
        self.parse_at(query, Utc::now())
    }

    /// Parse against an explicit reference time
    pub fn parse_at(&self, query: &str, now: DateTime<Utc>) -> SearchParams {
        let (params, degradation) = self.parse_with_report(query, now);
        if let Some(d) = degradation {
            tracing::debug!(%d, "query parse degraded");
        }
        params
    }

    /// Parse and report whether (and why) the rule-based path filled in
    pub fn parse_with_report(
        &self,
        query: &str,
        now: DateTime<Utc>,
    ) -> (SearchParams, Option<ParseDegradation>) {
        if query.trim().is_empty() {
            return (SearchParams::default(), None);
        }

        let rules = parse_rules(query, now);
        let Some(model) = self.capability.model() else {
            return (rules, Some(ParseDegradation::LlmUnavailable));
        };

        match ask_model(model, query) {
            Ok(fields) => merge_model_fields(&fields, rules, now),
            Err(degradation) => (rules, Some(degradation)),
        }
    }
}

fn parse_prompt(query: &str) -> String {
    format!(
        r#"Parse this Slack search query into structured search parameters.
Query: "{query}"

Return ONLY a JSON object with these fields:
{{
  "keywords": ["main", "search", "terms"],
  "time_range": "yesterday" | "today" | "last week" | "this week" | "this month" | "last N days" | null,
  "user_filter": "person name or handle" | null,
  "content_type": "decision" | "question" | "issue" | "general" | null,
  "sentiment": "positive" | "negative" | "neutral" | "concerned" | null,
  "channel_hint": "channel-name" | null
}}"#
    )
}

fn ask_model(
    model: &dyn LanguageModel,
    query: &str,
) -> Result<Map<String, Value>, ParseDegradation> {
    let answer = model
        .complete(&parse_prompt(query), 200)
        .map_err(ParseDegradation::LlmFailed)?;

    let json = extract_json_object(&answer)
        .ok_or_else(|| ParseDegradation::MalformedResponse("no JSON object".to_string()))?;

    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ParseDegradation::MalformedResponse(
            "not a JSON object".to_string(),
        )),
        Err(e) => Err(ParseDegradation::MalformedResponse(e.to_string())),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(String::from)
}

fn model_keywords(value: Option<&Value>) -> Option<BTreeSet<String>> {
    let items = value?.as_array()?;
    let keywords: BTreeSet<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && !is_stopword(k))
        .collect();
    (!keywords.is_empty()).then_some(keywords)
}

fn model_time_range(value: Option<&Value>, now: DateTime<Utc>) -> Option<TimeRange> {
    match value? {
        Value::String(phrase) => timeframe::resolve(phrase, now),
        Value::Object(bounds) => {
            let parse = |key: &str| {
                bounds
                    .get(key)
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|t| t.with_timezone(&Utc))
            };
            let (start, end) = (parse("start")?, parse("end")?);
            (start <= end).then(|| TimeRange::new(start, end, "custom range"))
        }
        _ => None,
    }
}

fn model_channel(value: Option<&Value>) -> Option<String> {
    let raw = match value? {
        Value::Array(items) => non_empty_str(items.first()),
        other => non_empty_str(Some(other)),
    }?;
    let name = raw.trim_start_matches('#').to_string();
    (!name.is_empty()).then_some(name)
}

/// Take each valid model field, rule-based value otherwise
fn merge_model_fields(
    fields: &Map<String, Value>,
    rules: SearchParams,
    now: DateTime<Utc>,
) -> (SearchParams, Option<ParseDegradation>) {
    let mut filled = Vec::new();

    let keywords = model_keywords(fields.get("keywords")).unwrap_or_else(|| {
        filled.push("keywords");
        rules.keywords
    });

    let time_range = model_time_range(
        fields.get("time_range").or_else(|| fields.get("time_filter")),
        now,
    )
    .or_else(|| {
        filled.push("time_range");
        rules.time_range
    });

    let user_filter = non_empty_str(fields.get("user_filter"))
        .map(|u| u.trim_start_matches('@').to_string())
        .or_else(|| {
            filled.push("user_filter");
            rules.user_filter
        });

    let content_type = non_empty_str(fields.get("content_type"))
        .and_then(|s| ContentType::parse(&s))
        .or_else(|| {
            filled.push("content_type");
            rules.content_type
        });

    let sentiment = non_empty_str(fields.get("sentiment"))
        .and_then(|s| Sentiment::parse(&s))
        .or_else(|| {
            filled.push("sentiment");
            rules.sentiment
        });

    // Tone words score through the sentiment boost, not as keywords
    let keywords = match sentiment {
        Some(tone) => {
            let kept: BTreeSet<String> = keywords
                .iter()
                .filter(|k| !tone.is_tone_word(k))
                .cloned()
                .collect();
            if kept.is_empty() {
                keywords
            } else {
                kept
            }
        }
        None => keywords,
    };

    let channel_hint = model_channel(
        fields
            .get("channel_hint")
            .or_else(|| fields.get("channel_hints")),
    )
    .or_else(|| {
        filled.push("channel_hint");
        rules.channel_hint
    });

    let params = SearchParams {
        keywords,
        time_range,
        user_filter,
        content_type,
        sentiment,
        channel_hint,
    };
    let degradation = (!filled.is_empty()).then_some(ParseDegradation::FieldsFilled(filled));
    (params, degradation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, 14, 30, 0).unwrap()
    }

    struct ScriptedModel(Result<&'static str, ()>);

    impl LanguageModel for ScriptedModel {
        fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
            match self.0 {
                Ok(answer) => Ok(answer.to_string()),
                Err(()) => Err(LlmError::Timeout { secs: 20 }),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn llm_parser(answer: Result<&'static str, ()>) -> QueryParser {
        QueryParser::new(ModelCapability::LlmBacked(Arc::new(ScriptedModel(answer))))
    }

    fn set(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_end_to_end_example_query() {
        let params = parse_rules("What did John say about deployment yesterday?", reference());
        assert_eq!(params.keywords, set(&["deployment"]));
        assert_eq!(params.user_filter.as_deref(), Some("John"));
        assert_eq!(params.time_range.unwrap().label, "yesterday");
        assert_eq!(params.content_type, None);
    }

    #[test]
    fn test_last_week_and_stopwords() {
        let params = parse_rules(
            "Show me discussions about deployment from last week",
            reference(),
        );
        assert_eq!(params.keywords, set(&["deployment"]));
        let range = params.time_range.unwrap();
        assert_eq!(range.end, reference());
        assert_eq!(range.start, reference() - Duration::days(7));
        assert_eq!(params.user_filter, None);
    }

    #[test]
    fn test_content_type_words_leave_keywords() {
        let params = parse_rules("Find decisions made about the mobile app", reference());
        assert_eq!(params.content_type, Some(ContentType::Decision));
        assert_eq!(params.keywords, set(&["mobile", "app"]));
    }

    #[test]
    fn test_sentiment_and_issue() {
        let params = parse_rules(
            "Show me concerns people raised about performance",
            reference(),
        );
        assert_eq!(params.sentiment, Some(Sentiment::Concerned));
        assert!(params.keywords.contains("performance"));
        assert!(!params.keywords.contains("concerns"));
    }

    #[test]
    fn test_user_reference_variants() {
        let params = parse_rules("api changes from @alice", reference());
        assert_eq!(params.user_filter.as_deref(), Some("alice"));

        let params = parse_rules("what Maria said on pricing", reference());
        assert_eq!(params.user_filter.as_deref(), Some("Maria"));
        assert_eq!(params.keywords, set(&["pricing"]));

        let params = parse_rules("rollout notes by Priya", reference());
        assert_eq!(params.user_filter.as_deref(), Some("Priya"));

        let params = parse_rules("errors from staging", reference());
        assert_eq!(params.user_filter, None);
        assert!(params.keywords.contains("staging"));

        let params = parse_rules("From Sarah about the budget", reference());
        assert_eq!(params.user_filter.as_deref(), Some("Sarah"));
    }

    #[test]
    fn test_from_calendar_or_title_case_is_not_a_user() {
        let params = parse_rules("Errors From Staging", reference());
        assert_eq!(params.user_filter, None);
        assert!(params.keywords.contains("staging"));

        let params = parse_rules("notes from Monday", reference());
        assert_eq!(params.user_filter, None);
        assert!(params.keywords.contains("monday"));

        let params = parse_rules("roadmap due by March", reference());
        assert_eq!(params.user_filter, None);
    }

    #[test]
    fn test_channel_hints() {
        let params = parse_rules("release notes in #eng-releases", reference());
        assert_eq!(params.channel_hint.as_deref(), Some("eng-releases"));
        assert!(params.keywords.contains("release"));

        let params = parse_rules("outage <#C024BE91L|ops> recap", reference());
        assert_eq!(params.channel_hint.as_deref(), Some("C024BE91L"));
    }

    #[test]
    fn test_never_empty_unless_query_empty() {
        for query in ["?", "the", "what did we say", "yesterday", "decisions", "!!!", "a b"] {
            let params = parse_rules(query, reference());
            assert!(!params.keywords.is_empty(), "empty keywords for {query:?}");
        }
        assert!(parse_rules("", reference()).keywords.is_empty());
        assert!(parse_rules("   ", reference()).keywords.is_empty());
    }

    #[test]
    fn test_fallback_keywords() {
        assert_eq!(fallback_keywords("the a"), set(&["the", "a"]));
        assert_eq!(fallback_keywords("???"), set(&["???"]));
        assert!(fallback_keywords(" ").is_empty());
    }

    #[test]
    fn test_rule_based_capability_reports_unavailable() {
        let parser = QueryParser::default();
        let (params, degradation) = parser.parse_with_report("deploy status", reference());
        assert_eq!(params.keywords, set(&["deploy", "status"]));
        assert!(matches!(degradation, Some(ParseDegradation::LlmUnavailable)));
    }

    #[test]
    fn test_llm_full_answer_is_used() {
        let parser = llm_parser(Ok(r##"```json
{"keywords": ["Deployment", "rollback"], "time_range": "yesterday",
 "user_filter": "@john", "content_type": "decisions", "sentiment": "concerned",
 "channel_hint": "#ops"}
```"##));
        let (params, degradation) =
            parser.parse_with_report("did john decide to roll back yesterday", reference());
        assert!(degradation.is_none());
        assert_eq!(params.keywords, set(&["deployment", "rollback"]));
        assert_eq!(params.time_range.unwrap().label, "yesterday");
        assert_eq!(params.user_filter.as_deref(), Some("john"));
        assert_eq!(params.content_type, Some(ContentType::Decision));
        assert_eq!(params.sentiment, Some(Sentiment::Concerned));
        assert_eq!(params.channel_hint.as_deref(), Some("ops"));
    }

    #[test]
    fn test_llm_partial_answer_falls_back_per_field() {
        let parser = llm_parser(Ok(
            r#"{"keywords": "not-a-list", "content_type": "vibes", "user_filter": null}"#,
        ));
        let (params, degradation) = parser
            .parse_with_report("What did John say about deployment yesterday?", reference());

        assert_eq!(params.keywords, set(&["deployment"]));
        assert_eq!(params.user_filter.as_deref(), Some("John"));
        assert_eq!(params.time_range.unwrap().label, "yesterday");
        match degradation {
            Some(ParseDegradation::FieldsFilled(fields)) => {
                assert!(fields.contains(&"keywords"));
                assert!(fields.contains(&"content_type"));
                assert!(fields.contains(&"user_filter"));
            }
            other => panic!("unexpected degradation: {other:?}"),
        }
    }

    #[test]
    fn test_llm_tone_words_leave_keywords() {
        let parser = llm_parser(Ok(
            r#"{"keywords": ["release", "worried", "schedule"], "sentiment": "neutral"}"#,
        ));
        let params = parser.parse_at("release schedule, anyone worried?", reference());
        assert_eq!(params.sentiment, Some(Sentiment::Neutral));
        assert_eq!(params.keywords, set(&["release", "schedule"]));

        let parser = llm_parser(Ok(r#"{"keywords": ["worried"], "sentiment": "concerned"}"#));
        let params = parser.parse_at("anyone worried?", reference());
        assert_eq!(params.keywords, set(&["worried"]));
    }

    #[test]
    fn test_llm_time_range_object() {
        let parser = llm_parser(Ok(
            r#"{"keywords": ["budget"], "time_range": {"start": "2024-05-01T00:00:00Z", "end": "2024-05-02T00:00:00Z"}}"#,
        ));
        let params = parser.parse_at("budget early may", reference());
        let range = params.time_range.unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(range.label, "custom range");
    }

    #[test]
    fn test_llm_garbage_and_failure_degrade_to_rules() {
        let rules = parse_rules("deployment from last week", reference());

        let (params, degradation) =
            llm_parser(Ok("I cannot help")).parse_with_report("deployment from last week", reference());
        assert_eq!(params, rules);
        assert!(matches!(degradation, Some(ParseDegradation::MalformedResponse(_))));

        let (params, degradation) =
            llm_parser(Ok("[1, 2]")).parse_with_report("deployment from last week", reference());
        assert_eq!(params, rules);
        assert!(matches!(degradation, Some(ParseDegradation::MalformedResponse(_))));

        let (params, degradation) =
            llm_parser(Err(())).parse_with_report("deployment from last week", reference());
        assert_eq!(params, rules);
        assert!(matches!(
            degradation,
            Some(ParseDegradation::LlmFailed(LlmError::Timeout { .. }))
        ));
    }

    #[test]
    fn test_empty_query_skips_model() {
        let (params, degradation) = llm_parser(Err(())).parse_with_report("  ", reference());
        assert!(params.keywords.is_empty());
        assert!(degradation.is_none());
    }
}
