//! Backend client for the widget conversation endpoints
//!
//! `ConversationApi` is the only I/O boundary of the session controller.
//! Every failure is normalized into `ApiError` here, including the decision
//! whether a remote error means "this session no longer exists".

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub mod types;

#[cfg(not(target_arch = "wasm32"))]
pub mod http;

#[cfg(target_arch = "wasm32")]
pub mod fetch;

pub use types::{EndConfirmation, HistoryPage, SendReply, WidgetServerConfig};

#[cfg(not(target_arch = "wasm32"))]
pub use http::HttpConversationClient;

#[cfg(target_arch = "wasm32")]
pub use fetch::FetchConversationClient;

use crate::shared::constants::DEFAULT_STALE_SESSION_PATTERN;
use types::ErrorBody;

/// Normalized failure of a backend call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response was obtained (network down, DNS, timeout, CORS)
    #[error("Network error: {message}")]
    Transport { message: String },

    /// The server answered with a failure or an unreadable body
    #[error("Server error ({status}): {message}")]
    Remote {
        status: u16,
        message: String,
        /// The backend no longer knows the session that was presented
        stale_session: bool,
    },
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport {
            message: message.into(),
        }
    }

    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        ApiError::Remote {
            status,
            message: message.into(),
            stale_session: false,
        }
    }

    pub fn stale_session(status: u16, message: impl Into<String>) -> Self {
        ApiError::Remote {
            status,
            message: message.into(),
            stale_session: true,
        }
    }

    pub fn is_stale_session(&self) -> bool {
        matches!(self, ApiError::Remote { stale_session: true, .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Transport { .. } => None,
            ApiError::Remote { status, .. } => Some(*status),
        }
    }

    /// Text shown to the end user
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Transport { .. } => {
                "Unable to reach the assistant. Check your connection and try again.".to_string()
            }
            ApiError::Remote { message, .. } => message.clone(),
        }
    }
}

static DEFAULT_STALE_SESSION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(DEFAULT_STALE_SESSION_PATTERN).expect("default stale-session pattern is valid")
});

/// Turns non-2xx responses into `ApiError`s.
///
/// A structured `sessionValid` field in the error body wins. Only when the
/// backend omits it is the error message matched against the stale-session
/// pattern.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    stale_session_pattern: Regex,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            stale_session_pattern: DEFAULT_STALE_SESSION_REGEX.clone(),
        }
    }
}

impl ErrorClassifier {
    pub fn new(stale_session_pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            stale_session_pattern: Regex::new(stale_session_pattern)?,
        })
    }

    pub fn classify(&self, status: u16, body: &str) -> ApiError {
        let parsed = serde_json::from_str::<ErrorBody>(body).unwrap_or_default();

        let message = parsed
            .error
            .or(parsed.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() || trimmed.starts_with('{') {
                    format!("HTTP {}", status)
                } else {
                    trimmed.to_string()
                }
            });

        let stale = match parsed.session_valid {
            Some(valid) => !valid,
            None => self.stale_session_pattern.is_match(&message),
        };

        ApiError::Remote {
            status,
            message,
            stale_session: stale,
        }
    }
}

/// `Send + Sync` on native targets, nothing on wasm32 where futures and
/// browser handles are single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSendSync: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> MaybeSendSync for T {}

#[cfg(target_arch = "wasm32")]
pub trait MaybeSendSync {}
#[cfg(target_arch = "wasm32")]
impl<T> MaybeSendSync for T {}

/// Backend operations used by the session controller
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait ConversationApi: MaybeSendSync {
    /// Post a user message and wait for the assistant's reply
    async fn send_message(&self, session_id: &str, text: &str) -> Result<SendReply, ApiError>;

    /// Server-side transcript of a session; may legitimately be empty
    async fn fetch_history(&self, session_id: &str) -> Result<HistoryPage, ApiError>;

    /// Tell the backend the conversation is over
    async fn end_session(&self, session_id: &str) -> Result<EndConfirmation, ApiError>;

    /// Locale and translation defaults for the widget
    async fn fetch_config(&self) -> Result<WidgetServerConfig, ApiError>;
}
