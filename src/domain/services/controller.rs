//! Conversation session controller
//!
//! Decides which session a message belongs to, when the session is
//! silently replaced, how failed sends are retried, and how the cached
//! transcript is reconciled with the server.
//!
//! All operations take `&self` so the UI can run a background revalidation
//! while the user keeps chatting. The state lock is only ever held for
//! synchronous sections; network calls happen with the lock released.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::lock::Mutex;
use serde::Serialize;
use tracing::Instrument;

use crate::domain::models::{Message, Rotation, RotationReason};
use crate::domain::services::message_cache::MessageCache;
use crate::domain::services::session_identity::SessionIdentity;
use crate::infrastructure::api::{ApiError, ConversationApi, SendReply, WidgetServerConfig};
use crate::infrastructure::storage::KeyValueStore;
use crate::shared::constants::keys;
use crate::shared::errors::ControllerError;
use crate::shared::logging;

/// Lifecycle phase of one widget instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerPhase {
    Idle,
    AwaitingHistory,
    Ready,
    Sending,
    EndingSession,
}

impl ControllerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerPhase::Idle => "idle",
            ControllerPhase::AwaitingHistory => "awaiting_history",
            ControllerPhase::Ready => "ready",
            ControllerPhase::Sending => "sending",
            ControllerPhase::EndingSession => "ending_session",
        }
    }
}

impl std::fmt::Display for ControllerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the initial transcript came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HydrationSource {
    /// Local cache; a background `revalidate` should follow
    Cache,
    /// Server history (possibly empty)
    Server,
    /// History could not be fetched; the widget starts empty
    Unavailable,
    /// The controller was shut down before hydration finished
    Dropped,
}

/// Result of `start`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hydration {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub source: HydrationSource,
    /// The cached transcript belongs to a session that already ended
    pub transcript_ended: bool,
    pub rotation: Option<Rotation>,
}

impl Hydration {
    pub fn needs_revalidation(&self) -> bool {
        self.source == HydrationSource::Cache
    }

    fn dropped() -> Self {
        Self {
            session_id: String::new(),
            messages: Vec::new(),
            source: HydrationSource::Dropped,
            transcript_ended: false,
            rotation: None,
        }
    }
}

/// Result of `send` / `retry`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendOutcome {
    Delivered {
        reply: Message,
        conversation_ended: bool,
        /// Session changes that happened while delivering (stale-session
        /// recovery and/or the conversation ending)
        rotations: Vec<Rotation>,
    },
    /// The controller was shut down; the response was discarded
    Dropped,
}

/// Result of `revalidate`
#[derive(Debug, Clone, PartialEq)]
pub enum RevalidationOutcome {
    /// The server still considers the session live
    StillActive,
    /// The session had ended and was replaced
    Rotated(Rotation),
    /// The session changed while the check was in flight; result ignored
    Superseded,
    /// History could not be fetched; nothing changed
    Failed(ApiError),
    Dropped,
}

/// Result of `end_conversation`
#[derive(Debug, Clone, PartialEq)]
pub enum EndOutcome {
    Ended {
        /// `None` when the session had already been replaced meanwhile
        rotation: Option<Rotation>,
        /// Whether the backend acknowledged the end request
        confirmed: bool,
    },
    Dropped,
}

/// Read-only view for the UI layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    pub session_id: String,
    pub phase: ControllerPhase,
    pub messages: Vec<Message>,
    /// Text of the failed message awaiting a retry
    pub pending_text: Option<String>,
    pub transcript_ended: bool,
}

#[derive(Debug, Clone)]
struct PendingSend {
    text: String,
    /// The optimistic user message, kept to re-attribute it after rotation
    message: Message,
}

struct ControllerState {
    store: KeyValueStore,
    identity: SessionIdentity,
    cache: MessageCache,
    phase: ControllerPhase,
    pending: Option<PendingSend>,
    transcript_ended: bool,
}

impl ControllerState {
    fn new(store: KeyValueStore) -> Self {
        let identity = SessionIdentity::new(store.clone());
        let cache = MessageCache::new(store.clone());
        let transcript_ended = !cache.is_empty()
            && store.get::<bool>(keys::TRANSCRIPT_ENDED).unwrap_or(false);

        Self {
            store,
            identity,
            cache,
            phase: ControllerPhase::Idle,
            pending: None,
            transcript_ended,
        }
    }

    fn session_id(&mut self) -> String {
        self.identity.get_or_create_session_id()
    }

    fn set_transcript_ended(&mut self, ended: bool) {
        self.transcript_ended = ended;
        self.store.set(keys::TRANSCRIPT_ENDED, &ended);
    }

    /// Replace the session and reset the transcript
    fn rotate_now(&mut self, reason: RotationReason) -> Rotation {
        let previous = self.session_id();
        let current = self.identity.rotate();
        self.cache.clear();
        self.set_transcript_ended(false);

        logging::log_session_rotated(&previous, &current, reason.as_str());
        Rotation::new(previous, current, reason)
    }

    /// Replace the session but leave the visible transcript in place,
    /// marked as ended. It is cleared before the first message of the new
    /// session.
    fn rotate_deferred(&mut self, reason: RotationReason) -> Rotation {
        let previous = self.session_id();
        let current = self.identity.rotate();
        let ended = !self.cache.is_empty();
        self.set_transcript_ended(ended);

        logging::log_session_rotated(&previous, &current, reason.as_str());
        Rotation::new(previous, current, reason)
    }

    fn begin_new_transcript_if_ended(&mut self) {
        if self.transcript_ended {
            self.cache.clear();
            self.set_transcript_ended(false);
        }
    }

    /// Make sure the pending user message is part of the current session's
    /// transcript (used when a retry or resend targets a new session).
    fn reattribute_pending(&mut self) {
        let Some(pending) = self.pending.clone() else {
            return;
        };

        self.begin_new_transcript_if_ended();
        if !self.cache.messages().iter().any(|m| *m == pending.message) {
            self.cache.append(pending.message);
        }
    }

    fn snapshot(&mut self) -> ConversationSnapshot {
        ConversationSnapshot {
            session_id: self.session_id(),
            phase: self.phase,
            messages: self.cache.load(),
            pending_text: self.pending.as_ref().map(|p| p.text.clone()),
            transcript_ended: self.transcript_ended,
        }
    }
}

/// One widget instance's conversation lifecycle
pub struct ConversationController<A> {
    api: A,
    state: Mutex<ControllerState>,
    shut_down: AtomicBool,
}

impl<A: ConversationApi> ConversationController<A> {
    pub fn new(api: A, store: KeyValueStore) -> Self {
        Self {
            api,
            state: Mutex::new(ControllerState::new(store)),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Stop mutating state. Responses still in flight are discarded and
    /// every later call becomes a no-op.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> ConversationSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Locale and translations from the backend, defaults if unreachable
    pub async fn fetch_server_config(&self) -> WidgetServerConfig {
        match self.api.fetch_config().await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch widget config - using defaults");
                WidgetServerConfig::default()
            }
        }
    }

    /// Hydrate the widget.
    ///
    /// A non-empty cache is shown immediately and the caller should run
    /// `revalidate` in the background. With an empty cache the server
    /// history is awaited, and an ended conversation is rotated away before
    /// anything is shown.
    pub async fn start(&self) -> Result<Hydration, ControllerError> {
        let session_id = {
            let mut state = self.state.lock().await;
            if self.is_shut_down() {
                return Ok(Hydration::dropped());
            }
            if state.phase != ControllerPhase::Idle {
                return Err(ControllerError::Busy {
                    action: "start",
                    phase: state.phase,
                });
            }

            let session_id = state.session_id();
            if !state.cache.is_empty() {
                state.phase = ControllerPhase::Ready;
                return Ok(Hydration {
                    session_id,
                    messages: state.cache.load(),
                    source: HydrationSource::Cache,
                    transcript_ended: state.transcript_ended,
                    rotation: None,
                });
            }

            state.phase = ControllerPhase::AwaitingHistory;
            session_id
        };

        let result = self.api.fetch_history(&session_id).await;

        let mut state = self.state.lock().await;
        if self.is_shut_down() {
            return Ok(Hydration::dropped());
        }

        let (source, rotation) = match result {
            Ok(page) if page.conversation_ended => {
                (HydrationSource::Server, Some(state.rotate_now(RotationReason::EndedAtStartup)))
            }
            Ok(page) => {
                state.cache.replace_all(page.messages);
                (HydrationSource::Server, None)
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "History unavailable - starting empty");
                (HydrationSource::Unavailable, None)
            }
        };
        state.phase = ControllerPhase::Ready;

        Ok(Hydration {
            session_id: state.session_id(),
            messages: state.cache.load(),
            source,
            transcript_ended: false,
            rotation,
        })
    }

    /// Background check of a cache-hydrated session.
    ///
    /// May rotate the session; never replaces the transcript.
    pub async fn revalidate(&self) -> RevalidationOutcome {
        let session_id = {
            let mut state = self.state.lock().await;
            if self.is_shut_down() {
                return RevalidationOutcome::Dropped;
            }
            state.session_id()
        };

        let result = self.api.fetch_history(&session_id).await;

        let mut state = self.state.lock().await;
        if self.is_shut_down() {
            return RevalidationOutcome::Dropped;
        }

        match result {
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Background revalidation failed");
                RevalidationOutcome::Failed(e)
            }
            Ok(page) => {
                logging::log_revalidation(&session_id, page.conversation_ended);
                if !page.conversation_ended {
                    RevalidationOutcome::StillActive
                } else if state.session_id() != session_id {
                    RevalidationOutcome::Superseded
                } else {
                    RevalidationOutcome::Rotated(state.rotate_deferred(RotationReason::EndedInBackground))
                }
            }
        }
    }

    /// Send a user message.
    ///
    /// The message is appended to the transcript before the network call.
    /// On failure it stays there and its text is kept for `retry`.
    pub async fn send(&self, text: &str) -> Result<SendOutcome, ControllerError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ControllerError::EmptyMessage);
        }

        let session_id = {
            let mut state = self.state.lock().await;
            if self.is_shut_down() {
                return Ok(SendOutcome::Dropped);
            }
            match state.phase {
                ControllerPhase::Ready => {}
                ControllerPhase::Sending => return Err(ControllerError::SendInFlight),
                phase => {
                    return Err(ControllerError::Busy {
                        action: "send",
                        phase,
                    });
                }
            }

            if state.pending.take().is_some() {
                tracing::debug!("New message supersedes the failed one");
            }

            state.begin_new_transcript_if_ended();
            let message = Message::user(text);
            state.cache.append(message.clone());
            state.pending = Some(PendingSend {
                text: text.to_string(),
                message,
            });
            state.phase = ControllerPhase::Sending;
            state.session_id()
        };

        let span = crate::log_context!(session_id.as_str(), "send");
        self.dispatch(session_id, text.to_string(), false)
            .instrument(span)
            .await
    }

    /// Resend the failed message without adding it to the transcript again
    pub async fn retry(&self) -> Result<SendOutcome, ControllerError> {
        let (session_id, text) = {
            let mut state = self.state.lock().await;
            if self.is_shut_down() {
                return Ok(SendOutcome::Dropped);
            }
            match state.phase {
                ControllerPhase::Ready => {}
                ControllerPhase::Sending => return Err(ControllerError::SendInFlight),
                phase => {
                    return Err(ControllerError::Busy {
                        action: "retry",
                        phase,
                    });
                }
            }

            let Some(text) = state.pending.as_ref().map(|p| p.text.clone()) else {
                return Err(ControllerError::NothingToRetry);
            };

            // The session may have been replaced since the failure
            state.reattribute_pending();
            state.phase = ControllerPhase::Sending;
            (state.session_id(), text)
        };

        let span = crate::log_context!(session_id.as_str(), "retry");
        self.dispatch(session_id, text, true).instrument(span).await
    }

    /// Deliver the pending message, recovering once from a stale session
    async fn dispatch(
        &self,
        session_id: String,
        text: String,
        is_retry: bool,
    ) -> Result<SendOutcome, ControllerError> {
        logging::log_send_attempt(&session_id, is_retry, text.len());

        let error = match self.api.send_message(&session_id, &text).await {
            Ok(reply) => return self.complete_send(reply, Vec::new()).await,
            Err(e) => e,
        };

        if !error.is_stale_session() {
            return self.fail_send(&session_id, error).await;
        }

        let (fresh_id, rotation) = {
            let mut state = self.state.lock().await;
            if self.is_shut_down() {
                return Ok(SendOutcome::Dropped);
            }
            let rotation = state.rotate_now(RotationReason::StaleSession);
            state.reattribute_pending();
            (rotation.current.id.clone(), rotation)
        };
        logging::log_stale_session_resend(&session_id, &fresh_id);

        match self.api.send_message(&fresh_id, &text).await {
            Ok(reply) => self.complete_send(reply, vec![rotation]).await,
            Err(e) => self.fail_send(&fresh_id, e).await,
        }
    }

    async fn complete_send(
        &self,
        reply: SendReply,
        mut rotations: Vec<Rotation>,
    ) -> Result<SendOutcome, ControllerError> {
        let mut state = self.state.lock().await;
        if self.is_shut_down() {
            return Ok(SendOutcome::Dropped);
        }

        state.cache.append(reply.reply.clone());
        state.pending = None;
        state.phase = ControllerPhase::Ready;

        if reply.conversation_ended {
            rotations.push(state.rotate_deferred(RotationReason::ConversationEnded));
        }

        Ok(SendOutcome::Delivered {
            reply: reply.reply,
            conversation_ended: reply.conversation_ended,
            rotations,
        })
    }

    async fn fail_send(&self, session_id: &str, error: ApiError) -> Result<SendOutcome, ControllerError> {
        let mut state = self.state.lock().await;
        if self.is_shut_down() {
            return Ok(SendOutcome::Dropped);
        }

        state.phase = ControllerPhase::Ready;
        logging::log_send_failed(session_id, &error.to_string());

        let pending_text = state
            .pending
            .as_ref()
            .map(|p| p.text.clone())
            .unwrap_or_default();

        Err(ControllerError::SendFailed {
            source: error,
            pending_text,
        })
    }

    /// End the conversation on user request.
    ///
    /// The backend call is best effort. The transcript stays visible, marked
    /// ended, and the next message starts a new session.
    pub async fn end_conversation(&self) -> Result<EndOutcome, ControllerError> {
        let session_id = {
            let mut state = self.state.lock().await;
            if self.is_shut_down() {
                return Ok(EndOutcome::Dropped);
            }
            if state.phase != ControllerPhase::Ready {
                return Err(ControllerError::Busy {
                    action: "end the conversation",
                    phase: state.phase,
                });
            }
            state.phase = ControllerPhase::EndingSession;
            state.session_id()
        };

        let confirmed = match self.api.end_session(&session_id).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "End session request failed - rotating anyway");
                false
            }
        };

        let mut state = self.state.lock().await;
        if self.is_shut_down() {
            return Ok(EndOutcome::Dropped);
        }

        state.pending = None;
        let rotation = if state.session_id() == session_id {
            Some(state.rotate_deferred(RotationReason::UserEnded))
        } else {
            None
        };
        state.phase = ControllerPhase::Ready;

        Ok(EndOutcome::Ended { rotation, confirmed })
    }

    /// Forget the transcript and start a new session.
    ///
    /// Returns `None` after shutdown.
    pub async fn clear_history(&self) -> Result<Option<Rotation>, ControllerError> {
        let mut state = self.state.lock().await;
        if self.is_shut_down() {
            return Ok(None);
        }
        if matches!(state.phase, ControllerPhase::Sending | ControllerPhase::EndingSession) {
            return Err(ControllerError::Busy {
                action: "clear the history",
                phase: state.phase,
            });
        }

        state.pending = None;
        Ok(Some(state.rotate_now(RotationReason::HistoryCleared)))
    }
}
