//! Result formatter: grouped matches → text report
//!
//! Layout (deterministic apart from an LLM summary):
//! header, detected filters, optional summary, top conversations, trailer.

use std::collections::HashMap;
use std::fmt::Write as _;

use super::grouper::{match_count, Conversation};
use crate::config::SearchSection;
use crate::llm::ModelCapability;
use crate::slack::UserDirectory;

/// Messages quoted in the summary prompt
const SUMMARY_MESSAGES: usize = 5;
const SUMMARY_MESSAGE_CHARS: usize = 200;
const SUMMARY_MAX_TOKENS: u32 = 100;
/// Thread members listed per conversation
const MEMBERS_SHOWN: usize = 5;

/// Everything the report needs besides the conversations
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    pub users: UserDirectory,
    /// channel id → name
    pub channel_names: HashMap<String, String>,
    /// Pre-rendered filter descriptions ("time: yesterday", ...)
    pub filters: Vec<String>,
}

impl ReportContext {
    fn channel_label<'a>(&'a self, channel_id: &'a str) -> &'a str {
        self.channel_names
            .get(channel_id)
            .map(String::as_str)
            .unwrap_or(channel_id)
    }
}

/// First `max_chars` characters on one line, "..." when cut
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

/// Fixed message for an empty result set; contains `query` verbatim
pub fn no_results(query: &str) -> String {
    format!(
        "No messages found matching '{}'. Try different keywords or check if the bot has access to relevant channels.",
        query
    )
}

/// One- or two-sentence summary of the matches
#[derive(Debug, Clone, Default)]
pub struct Summarizer {
    capability: ModelCapability,
}

impl Summarizer {
    pub fn new(capability: ModelCapability) -> Self {
        Self { capability }
    }

    /// Count-based sentence used without a model or when the model fails
    pub fn templated(conversations: &[Conversation]) -> String {
        match (match_count(conversations), conversations.len()) {
            (0, _) => "No relevant messages found.".to_string(),
            (1, _) => "Found 1 relevant message matching your search.".to_string(),
            (n, 1) => format!("Found {} relevant messages in one conversation.", n),
            (n, c) => format!("Found {} relevant messages across {} conversations.", n, c),
        }
    }

    pub fn summarize(
        &self,
        conversations: &[Conversation],
        query: &str,
        users: &UserDirectory,
    ) -> String {
        let Some(model) = self.capability.model() else {
            return Self::templated(conversations);
        };
        if conversations.is_empty() {
            return Self::templated(conversations);
        }

        let mut top: Vec<_> = conversations.iter().flat_map(|c| &c.members).collect();
        top.sort_by(|a, b| b.score.total_cmp(&a.score));
        let quoted: Vec<String> = top
            .iter()
            .take(SUMMARY_MESSAGES)
            .map(|m| {
                let text: String = m.message.text.chars().take(SUMMARY_MESSAGE_CHARS).collect();
                format!("{}: {}", users.label(&m.message.user_id), text)
            })
            .collect();

        let prompt = format!(
            "User searched Slack for: \"{}\"\n\nMost relevant messages:\n{}\n\n\
             Provide a 1-2 sentence summary of what these results show about the topic. \
             Focus on key insights, decisions, or important information.",
            query,
            quoted.join("\n")
        );

        match model.complete(&prompt, SUMMARY_MAX_TOKENS) {
            Ok(summary) => summary,
            Err(e) => {
                tracing::debug!("summary fell back to template: {e}");
                Self::templated(conversations)
            }
        }
    }
}

pub struct ResultFormatter {
    summarizer: Summarizer,
    max_conversations: usize,
    excerpt_chars: usize,
}

impl ResultFormatter {
    pub fn new(summarizer: Summarizer, config: &SearchSection) -> Self {
        Self {
            summarizer,
            max_conversations: config.max_conversations_shown,
            excerpt_chars: config.excerpt_chars,
        }
    }

    /// Render without sender names or channel names
    pub fn format(
        &self,
        conversations: &[Conversation],
        original_query: &str,
        include_summary: bool,
    ) -> String {
        self.format_with(
            conversations,
            original_query,
            include_summary,
            &ReportContext::default(),
        )
    }

    pub fn format_with(
        &self,
        conversations: &[Conversation],
        original_query: &str,
        include_summary: bool,
        context: &ReportContext,
    ) -> String {
        if conversations.is_empty() {
            return no_results(original_query);
        }

        let total = match_count(conversations);
        let mut out = String::new();
        let _ = writeln!(out, "Smart search results for: '{}'", original_query);
        let _ = writeln!(
            out,
            "Found {} relevant {} in {} {}",
            total,
            plural(total, "message", "messages"),
            conversations.len(),
            plural(conversations.len(), "conversation", "conversations"),
        );
        if !context.filters.is_empty() {
            let _ = writeln!(out, "Detected filters: {}", context.filters.join(", "));
        }

        if include_summary {
            let summary =
                self.summarizer
                    .summarize(conversations, original_query, &context.users);
            let _ = writeln!(out, "\nSummary: {}", summary);
        }

        for (i, conversation) in conversations
            .iter()
            .take(self.max_conversations)
            .enumerate()
        {
            out.push('\n');
            self.render_conversation(&mut out, i + 1, conversation, context);
        }

        let hidden = conversations.len().saturating_sub(self.max_conversations);
        if hidden > 0 {
            let _ = writeln!(
                out,
                "\n... {} more {} not shown",
                hidden,
                plural(hidden, "conversation", "conversations")
            );
        }

        out
    }

    fn render_conversation(
        &self,
        out: &mut String,
        rank: usize,
        conversation: &Conversation,
        context: &ReportContext,
    ) {
        let _ = writeln!(
            out,
            "{}. #{} (score {:.2}, {} {})",
            rank,
            context.channel_label(&conversation.channel_id),
            conversation.max_score(),
            conversation.len(),
            plural(conversation.len(), "message", "messages"),
        );

        for member in conversation.members.iter().take(MEMBERS_SHOWN) {
            let message = &member.message;
            let _ = writeln!(
                out,
                "   [{}] {}: {}",
                message.timestamp.format("%Y-%m-%d %H:%M UTC"),
                context.users.label(&message.user_id),
                excerpt(&message.text, self.excerpt_chars),
            );
        }
        let more = conversation.len().saturating_sub(MEMBERS_SHOWN);
        if more > 0 {
            let _ = writeln!(out, "   (+{} more in thread)", more);
        }

        if let Some(best) = conversation.best().filter(|b| !b.reasons.is_empty()) {
            let _ = writeln!(out, "   Why: {}", best.reasons.join("; "));
        }
    }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}
