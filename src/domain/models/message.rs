use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a transcript entry.
///
/// Only the two conversational roles exist at this layer; system and tool
/// records coming from the backend are dropped before they get here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("Unsupported message role: {}", other)),
        }
    }
}

/// One turn in the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    /// User message stamped with the client clock
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content, Utc::now())
    }

    /// Assistant message stamped with the client clock (used when the
    /// backend reply carries no timestamp)
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content, Utc::now())
    }
}

/// Lenient shape of a persisted or server-provided message.
///
/// Roles are kept as raw strings so unknown entries can be filtered out
/// instead of failing the whole sequence.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "created_at")]
    pub timestamp: Option<String>,
}

impl RawMessage {
    /// Convert into a transcript message, or `None` for non-conversational roles.
    ///
    /// Unparseable timestamps fall back to `fallback_time` so ordering of the
    /// surrounding sequence is preserved.
    pub fn into_message(self, fallback_time: DateTime<Utc>) -> Option<Message> {
        let role = self.role.parse::<MessageRole>().ok()?;
        let timestamp = self
            .timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(fallback_time);

        Some(Message {
            role,
            content: self.content,
            timestamp,
        })
    }
}

/// Parse RFC 3339 timestamps as well as the naive `YYYY-MM-DD HH:MM:SS`
/// form some backends emit for UTC columns.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Filter a sequence of raw entries down to conversational messages.
///
/// Returns the kept messages and the number of dropped entries.
pub fn filter_conversational(raw: Vec<RawMessage>) -> (Vec<Message>, usize) {
    let now = Utc::now();
    let total = raw.len();
    let messages: Vec<Message> = raw
        .into_iter()
        .filter_map(|entry| entry.into_message(now))
        .collect();
    let dropped = total - messages.len();
    (messages, dropped)
}
