//! Structured logging for the widget core
//!
//! Provides consistent, contextual logging across storage, the backend
//! client and the session controller. Every event carries an `operation`
//! field so logs can be filtered per subsystem.

/// Log operations for different subsystems
#[derive(Debug, Clone, Copy)]
pub enum LogOperation {
    Storage,
    SessionIdentity,
    MessageCache,
    RemoteCall,
    SessionRotation,
    SendMessage,
    Revalidation,
}

impl LogOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogOperation::Storage => "storage",
            LogOperation::SessionIdentity => "session_identity",
            LogOperation::MessageCache => "message_cache",
            LogOperation::RemoteCall => "remote_call",
            LogOperation::SessionRotation => "session_rotation",
            LogOperation::SendMessage => "send_message",
            LogOperation::Revalidation => "revalidation",
        }
    }
}

/// Log that the storage probe failed and the store is disabled
pub fn log_storage_unavailable(prefix: &str, reason: &str) {
    tracing::warn!(
        operation = LogOperation::Storage.as_str(),
        prefix = prefix,
        reason = reason,
        "Storage unavailable - persistence disabled for this instance"
    );
}

/// Log a failed storage read/write (the operation degrades to a no-op)
pub fn log_storage_failure(action: &str, key: &str, error: &str) {
    tracing::warn!(
        operation = LogOperation::Storage.as_str(),
        action = action,
        key = key,
        error = error,
        "Storage operation failed"
    );
}

/// Log a freshly generated session id
pub fn log_session_created(session_id: &str, persisted: bool) {
    tracing::info!(
        operation = LogOperation::SessionIdentity.as_str(),
        session_id = session_id,
        persisted = persisted,
        "Generated new session id"
    );
}

/// Log entries dropped while loading the cache
pub fn log_cache_entries_filtered(dropped: usize) {
    tracing::debug!(
        operation = LogOperation::MessageCache.as_str(),
        dropped = dropped,
        "Filtered invalid entries from cached transcript"
    );
}

/// Log cache truncation
pub fn log_cache_truncated(dropped: usize, kept: usize) {
    tracing::trace!(
        operation = LogOperation::MessageCache.as_str(),
        dropped = dropped,
        kept = kept,
        "Truncated cached transcript"
    );
}

/// Log an outgoing backend request
pub fn log_remote_call_start(endpoint: &str, session_id: &str) {
    tracing::debug!(
        operation = LogOperation::RemoteCall.as_str(),
        endpoint = endpoint,
        session_id = session_id,
        "Calling backend"
    );
}

/// Log a failed backend request
pub fn log_remote_call_error(endpoint: &str, session_id: &str, error: &str) {
    tracing::warn!(
        operation = LogOperation::RemoteCall.as_str(),
        endpoint = endpoint,
        session_id = session_id,
        error = error,
        "Backend call failed"
    );
}

/// Log a session rotation
pub fn log_session_rotated(previous: &str, current: &str, reason: &str) {
    tracing::info!(
        operation = LogOperation::SessionRotation.as_str(),
        previous_session = previous,
        session_id = current,
        reason = reason,
        "Session rotated"
    );
}

/// Log a send attempt
pub fn log_send_attempt(session_id: &str, is_retry: bool, length: usize) {
    tracing::debug!(
        operation = LogOperation::SendMessage.as_str(),
        session_id = session_id,
        is_retry = is_retry,
        message_length = length,
        "Sending message"
    );
}

/// Log a send failure surfaced to the UI
pub fn log_send_failed(session_id: &str, error: &str) {
    tracing::error!(
        operation = LogOperation::SendMessage.as_str(),
        session_id = session_id,
        error = error,
        "Message send failed"
    );
}

/// Log the silent resend after a stale-session signal
pub fn log_stale_session_resend(stale: &str, fresh: &str) {
    tracing::info!(
        operation = LogOperation::SendMessage.as_str(),
        stale_session = stale,
        session_id = fresh,
        "Backend no longer knows the session - resending under a new id"
    );
}

/// Log the background revalidation result
pub fn log_revalidation(session_id: &str, conversation_ended: bool) {
    tracing::debug!(
        operation = LogOperation::Revalidation.as_str(),
        session_id = session_id,
        conversation_ended = conversation_ended,
        "Background history revalidation finished"
    );
}

/// Macro for creating structured log context
#[macro_export]
macro_rules! log_context {
    ($session:expr) => {
        tracing::info_span!("assistant_widget", session_id = $session)
    };
    ($session:expr, $action:expr) => {
        tracing::info_span!("assistant_widget", session_id = $session, action = $action)
    };
}

/// Initialise the tracing subscriber for native binaries
#[cfg(not(target_arch = "wasm32"))]
pub fn init_tracing(default_level: tracing::Level) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Receives one formatted event at a time
pub type LineSink = fn(tracing::Level, &str);

/// `MakeWriter` that hands each formatted event, with its level, to a sink.
///
/// Browsers have no stderr, so the wasm build routes events to
/// `console.error` / `console.warn` / ... through this.
#[derive(Clone, Copy)]
pub struct MakeLineWriter {
    sink: LineSink,
}

impl MakeLineWriter {
    pub fn new(sink: LineSink) -> Self {
        Self { sink }
    }
}

/// Buffers one event and flushes it to the sink on drop
pub struct LineWriter {
    level: tracing::Level,
    buffer: Vec<u8>,
    sink: LineSink,
}

impl std::io::Write for LineWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for LineWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buffer);
        let line = line.trim_end();
        if !line.is_empty() {
            (self.sink)(self.level, line);
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for MakeLineWriter {
    type Writer = LineWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LineWriter {
            level: tracing::Level::INFO,
            buffer: Vec::new(),
            sink: self.sink,
        }
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        LineWriter {
            level: *meta.level(),
            buffer: Vec::new(),
            sink: self.sink,
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn console_sink(level: tracing::Level, line: &str) {
    let value = wasm_bindgen::JsValue::from_str(line);
    match level {
        tracing::Level::ERROR => web_sys::console::error_1(&value),
        tracing::Level::WARN => web_sys::console::warn_1(&value),
        tracing::Level::INFO => web_sys::console::info_1(&value),
        _ => web_sys::console::debug_1(&value),
    }
}

/// Initialise a tracing subscriber that writes to the browser console.
///
/// Safe to call once per widget; later calls keep the first subscriber.
#[cfg(target_arch = "wasm32")]
pub fn init_console_tracing(max_level: tracing::Level) {
    // No ANSI colors or wall clock in the browser console
    let _ = tracing_subscriber::fmt()
        .with_max_level(max_level)
        .with_ansi(false)
        .without_time()
        .with_writer(MakeLineWriter::new(console_sink))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    thread_local! {
        static CAPTURED: RefCell<Vec<(tracing::Level, String)>> = const { RefCell::new(Vec::new()) };
    }

    fn capture(level: tracing::Level, line: &str) {
        CAPTURED.with(|lines| lines.borrow_mut().push((level, line.to_string())));
    }

    #[test]
    fn test_line_writer_forwards_events_with_level() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .without_time()
            .with_writer(MakeLineWriter::new(capture))
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            log_storage_unavailable("w_", "localStorage denied");
            tracing::error!("backend unreachable");
        });

        let lines = CAPTURED.with(|lines| lines.borrow().clone());
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, tracing::Level::WARN);
        assert!(lines[0].1.contains("localStorage denied"));
        assert_eq!(lines[1].0, tracing::Level::ERROR);
        assert!(lines[1].1.contains("backend unreachable"));
        assert!(lines.iter().all(|(_, line)| !line.ends_with('\n')));
    }

    #[test]
    fn test_log_operation_as_str() {
        assert_eq!(LogOperation::Storage.as_str(), "storage");
        assert_eq!(LogOperation::SessionIdentity.as_str(), "session_identity");
        assert_eq!(LogOperation::MessageCache.as_str(), "message_cache");
        assert_eq!(LogOperation::RemoteCall.as_str(), "remote_call");
        assert_eq!(LogOperation::SessionRotation.as_str(), "session_rotation");
        assert_eq!(LogOperation::SendMessage.as_str(), "send_message");
        assert_eq!(LogOperation::Revalidation.as_str(), "revalidation");
    }
}
