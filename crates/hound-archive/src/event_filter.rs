use crate::chat_event::ChatMessageEvent;

/// Identities the recording decision depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingPolicy {
    pub bot_user_id: String,
    pub author_id: String,
}

impl RecordingPolicy {
    pub fn new(bot_user_id: impl Into<String>, author_id: impl Into<String>) -> Self {
        Self {
            bot_user_id: bot_user_id.into(),
            author_id: author_id.into(),
        }
    }

    fn mentions_bot(&self, text: &str) -> bool {
        let bot = self.bot_user_id.trim();
        if bot.is_empty() {
            return false;
        }
        let text = text.trim_start();
        text.starts_with(&format!("<@{bot}>")) || text.starts_with(&format!("<@{bot}|"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    BotMention,
    ForeignAuthor,
    NonContentSubtype(String),
    EmptyText,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BotMention => "bot_mention",
            Self::ForeignAuthor => "foreign_author",
            Self::NonContentSubtype(_) => "non_content_subtype",
            Self::EmptyText => "empty_text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Record,
    Skip(SkipReason),
    /// Passed every predicate but cannot be stored (no channel or timestamp).
    Malformed(&'static str),
}

/// Decides whether a message is recorded. Predicates run in a fixed order:
/// bot mention, author, subtype, empty text.
pub fn decide(event: &ChatMessageEvent, policy: &RecordingPolicy) -> FilterDecision {
    if policy.mentions_bot(&event.text) {
        return FilterDecision::Skip(SkipReason::BotMention);
    }
    if event.author_id != policy.author_id {
        return FilterDecision::Skip(SkipReason::ForeignAuthor);
    }
    match event.sub_type.as_deref() {
        None | Some("") | Some("file_share") => {}
        Some(other) => return FilterDecision::Skip(SkipReason::NonContentSubtype(other.to_string())),
    }
    if event.text.trim().is_empty() && !event.is_file_share() {
        return FilterDecision::Skip(SkipReason::EmptyText);
    }
    if event.channel_id.trim().is_empty() {
        return FilterDecision::Malformed("missing channel id");
    }
    if event.event_timestamp.trim().is_empty() {
        return FilterDecision::Malformed("missing event timestamp");
    }
    FilterDecision::Record
}
