use serde::{Deserialize, Serialize};

/// Session status.
///
/// `Ended` is only ever inferred from a backend signal or an explicit user
/// action; the client never invents it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// One logical conversation with the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub status: SessionStatus,
}

impl Session {
    pub fn active(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: SessionStatus::Active,
        }
    }

    pub fn ended(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: SessionStatus::Ended,
        }
    }
}

/// Why the current session id was replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationReason {
    /// History fetched at startup reported the conversation as ended
    EndedAtStartup,
    /// Background revalidation reported the conversation as ended
    EndedInBackground,
    /// A reply carried `conversationEnded: true`
    ConversationEnded,
    /// The backend no longer knows the session
    StaleSession,
    /// The user ended the conversation
    UserEnded,
    /// The user cleared the history
    HistoryCleared,
}

impl RotationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationReason::EndedAtStartup => "ended_at_startup",
            RotationReason::EndedInBackground => "ended_in_background",
            RotationReason::ConversationEnded => "conversation_ended",
            RotationReason::StaleSession => "stale_session",
            RotationReason::UserEnded => "user_ended",
            RotationReason::HistoryCleared => "history_cleared",
        }
    }
}

/// Record of a session transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rotation {
    pub retired: Session,
    pub current: Session,
    pub reason: RotationReason,
}

impl Rotation {
    pub fn new(retired_id: impl Into<String>, current_id: impl Into<String>, reason: RotationReason) -> Self {
        Self {
            retired: Session::ended(retired_id),
            current: Session::active(current_id),
            reason,
        }
    }
}
