//! Browser backend client (gloo-net over `fetch`)
//!
//! Timeouts are left to the browser; an aborted or failed fetch surfaces as
//! `ApiError::Transport` like any other network failure.

use async_trait::async_trait;
use gloo_net::http::{Request, RequestBuilder};

use crate::config::WidgetConfig;
use crate::shared::constants::{WIDGET_KEY_HEADER, routes};
use crate::shared::errors::Result;
use crate::shared::logging;

use super::types::{
    EndSessionRequest, HistoryResponse, SendMessageRequest, SendMessageResponse, decode_body,
    decode_confirmation,
};
use super::{ApiError, ConversationApi, EndConfirmation, ErrorClassifier, HistoryPage, SendReply, WidgetServerConfig};

#[derive(Debug, Clone)]
pub struct FetchConversationClient {
    base_url: String,
    widget_key: Option<String>,
    classifier: ErrorClassifier,
}

impl FetchConversationClient {
    pub fn new(config: &WidgetConfig) -> Result<Self> {
        let classifier = config.validate()?;

        Ok(Self {
            base_url: config.base_url().to_string(),
            widget_key: config.widget_key.clone(),
            classifier,
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Content-Type", "application/json");
        match &self.widget_key {
            Some(key) => request.header(WIDGET_KEY_HEADER, key),
            None => request,
        }
    }

    async fn execute(
        &self,
        request: std::result::Result<Request, gloo_net::Error>,
        endpoint: &str,
        session_id: &str,
    ) -> std::result::Result<(u16, String), ApiError> {
        logging::log_remote_call_start(endpoint, session_id);

        let transport = |e: gloo_net::Error| {
            logging::log_remote_call_error(endpoint, session_id, &e.to_string());
            ApiError::transport(e.to_string())
        };

        let response = request.map_err(transport)?.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        if !response.ok() {
            let error = self.classifier.classify(status, &body);
            logging::log_remote_call_error(endpoint, session_id, &error.to_string());
            return Err(error);
        }

        Ok((status, body))
    }
}

#[async_trait(?Send)]
impl ConversationApi for FetchConversationClient {
    async fn send_message(&self, session_id: &str, text: &str) -> std::result::Result<SendReply, ApiError> {
        let request = self.with_key(Request::post(&self.url(routes::SEND_MESSAGE))).json(
            &SendMessageRequest {
                session_id: session_id.to_string(),
                message: text.to_string(),
            },
        );

        let (status, body) = self.execute(request, routes::SEND_MESSAGE, session_id).await?;
        decode_body::<SendMessageResponse>(status, &body).map(SendReply::from)
    }

    async fn fetch_history(&self, session_id: &str) -> std::result::Result<HistoryPage, ApiError> {
        let url = format!(
            "{}/{}",
            self.url(routes::HISTORY),
            urlencoding::encode(session_id)
        );
        let request = self.with_key(Request::get(&url)).build();

        let (status, body) = self.execute(request, routes::HISTORY, session_id).await?;
        decode_body::<HistoryResponse>(status, &body).map(HistoryPage::from)
    }

    async fn end_session(&self, session_id: &str) -> std::result::Result<EndConfirmation, ApiError> {
        let request = self.with_key(Request::post(&self.url(routes::END_SESSION))).json(
            &EndSessionRequest {
                session_id: session_id.to_string(),
            },
        );

        let (_, body) = self.execute(request, routes::END_SESSION, session_id).await?;
        Ok(decode_confirmation(&body))
    }

    async fn fetch_config(&self) -> std::result::Result<WidgetServerConfig, ApiError> {
        let request = self.with_key(Request::get(&self.url(routes::CONFIG))).build();

        let (status, body) = self.execute(request, routes::CONFIG, "").await?;
        decode_body(status, &body)
    }
}
