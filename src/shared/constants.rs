//! Fixed values shared by the widget core

/// Prefix for every key the widget writes to the browser/local store
pub const DEFAULT_STORAGE_PREFIX: &str = "assistant_widget_";

/// Maximum number of messages kept in the local transcript cache
pub const MAX_CACHED_MESSAGES: usize = 20;

/// Prefix of every generated session id
pub const SESSION_ID_PREFIX: &str = "session";

/// Length of the random suffix of a generated session id
pub const SESSION_ID_RANDOM_LEN: usize = 9;

/// Default backend origin when nothing is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3401";

/// Default request timeout for the native HTTP client
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Header carrying the tenant's public widget key
pub const WIDGET_KEY_HEADER: &str = "X-Widget-Key";

/// Case-insensitive pattern matching backend errors for sessions it no longer
/// knows. Underscores count as separators so codes like `SESSION_NOT_FOUND` match.
pub const DEFAULT_STALE_SESSION_PATTERN: &str = r"(?i)session.*?(?:\b|_)not[\s_]+found";

/// Persisted keys (namespaced by the storage prefix)
pub mod keys {
    pub const SESSION_ID: &str = "session_id";
    pub const MESSAGES: &str = "messages";
    pub const TRANSCRIPT_ENDED: &str = "transcript_ended";
    pub const WIDGET_OPEN: &str = "widget_open";
    pub const UNREAD_COUNT: &str = "unread_count";
}

/// Backend routes, relative to the configured base URL
pub mod routes {
    pub const SEND_MESSAGE: &str = "/api/widget/chat";
    pub const HISTORY: &str = "/api/widget/chat/history";
    pub const END_SESSION: &str = "/api/widget/chat/end";
    pub const CONFIG: &str = "/api/widget/config";
}
