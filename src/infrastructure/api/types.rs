//! Wire shapes of the widget endpoints and their decoded forms

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::models::{Message, RawMessage, filter_conversational};
use crate::shared::logging;

use super::ApiError;

/// `POST /api/widget/chat` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub session_id: String,
    pub message: String,
}

/// `POST /api/widget/chat` success body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub response: String,
    #[serde(default)]
    pub conversation_ended: Option<bool>,
}

/// `GET /api/widget/chat/history/{sessionId}` success body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    #[serde(default)]
    pub conversation_ended: Option<bool>,
}

/// `POST /api/widget/chat/end` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    pub session_id: String,
}

/// Non-2xx body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_valid: Option<bool>,
}

/// Decoded reply to a sent message
#[derive(Debug, Clone, PartialEq)]
pub struct SendReply {
    pub reply: Message,
    pub conversation_ended: bool,
}

impl From<SendMessageResponse> for SendReply {
    fn from(response: SendMessageResponse) -> Self {
        Self {
            reply: Message::assistant(response.response),
            conversation_ended: response.conversation_ended.unwrap_or(false),
        }
    }
}

/// Decoded server transcript, already stripped of non-conversational roles
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub conversation_ended: bool,
}

impl From<HistoryResponse> for HistoryPage {
    fn from(response: HistoryResponse) -> Self {
        let (messages, dropped) = filter_conversational(response.messages);
        if dropped > 0 {
            logging::log_cache_entries_filtered(dropped);
        }

        Self {
            messages,
            conversation_ended: response.conversation_ended.unwrap_or(false),
        }
    }
}

/// Whatever the backend returns when a session is ended; not interpreted
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EndConfirmation(pub serde_json::Value);

/// Server-provided widget defaults consumed at startup
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetServerConfig {
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub translations: HashMap<String, String>,
    #[serde(default)]
    pub greeting: Option<String>,
}

impl WidgetServerConfig {
    /// Translation for `key`, falling back to the key itself
    pub fn translate<'a>(&'a self, key: &'a str) -> &'a str {
        self.translations.get(key).map(String::as_str).unwrap_or(key)
    }
}

/// Decode a 2xx body, reporting garbage as a remote failure
pub(crate) fn decode_body<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body)
        .map_err(|e| ApiError::remote(status, format!("Malformed response from server: {}", e)))
}

/// End-session confirmations may be empty or non-JSON
pub(crate) fn decode_confirmation(body: &str) -> EndConfirmation {
    EndConfirmation(serde_json::from_str(body).unwrap_or(serde_json::Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MessageRole;

    #[test]
    fn test_send_request_is_camel_case() {
        let body = serde_json::to_value(SendMessageRequest {
            session_id: "session_1_abc".into(),
            message: "hi".into(),
        })
        .unwrap();

        assert_eq!(body["sessionId"], "session_1_abc");
        assert_eq!(body["message"], "hi");
    }

    #[test]
    fn test_send_response_defaults_conversation_ended() {
        let response: SendMessageResponse = decode_body(200, r#"{"response":"Hello!"}"#).unwrap();
        let reply = SendReply::from(response);

        assert_eq!(reply.reply.role, MessageRole::Assistant);
        assert_eq!(reply.reply.content, "Hello!");
        assert!(!reply.conversation_ended);
    }

    #[test]
    fn test_history_filters_roles_and_parses_timestamps() {
        let response: HistoryResponse = decode_body(
            200,
            r#"{
                "messages": [
                    {"role":"system","content":"prompt","created_at":"2025-01-01T09:59:00Z"},
                    {"role":"user","content":"hi","created_at":"2025-01-01T10:00:00Z"},
                    {"role":"assistant","content":"hello","created_at":"2025-01-01 10:00:05"}
                ],
                "conversationEnded": true
            }"#,
        )
        .unwrap();
        let page = HistoryPage::from(response);

        assert!(page.conversation_ended);
        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[0].content, "hi");
        assert!(page.messages[0].timestamp < page.messages[1].timestamp);
    }

    #[test]
    fn test_empty_history_is_valid() {
        let page = HistoryPage::from(decode_body::<HistoryResponse>(200, "{}").unwrap());

        assert!(page.messages.is_empty());
        assert!(!page.conversation_ended);
    }

    #[test]
    fn test_malformed_body_is_remote_error() {
        let err = decode_body::<SendMessageResponse>(200, "<html>").unwrap_err();

        assert_eq!(err.status(), Some(200));
        assert!(!err.is_stale_session());
    }

    #[test]
    fn test_confirmation_is_lenient() {
        assert_eq!(decode_confirmation(""), EndConfirmation(serde_json::Value::Null));
        assert_eq!(
            decode_confirmation(r#"{"success":true}"#).0["success"],
            serde_json::Value::Bool(true)
        );
    }

    #[test]
    fn test_server_config_translate() {
        let config: WidgetServerConfig = serde_json::from_str(
            r#"{"locale":"fr","translations":{"send":"Envoyer"}}"#,
        )
        .unwrap();

        assert_eq!(config.locale.as_deref(), Some("fr"));
        assert_eq!(config.translate("send"), "Envoyer");
        assert_eq!(config.translate("retry"), "retry");
    }
}
