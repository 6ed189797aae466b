//! Native backend client (reqwest)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};

use crate::config::WidgetConfig;
use crate::shared::constants::{WIDGET_KEY_HEADER, routes};
use crate::shared::errors::{AppError, Result};
use crate::shared::logging;

use super::types::{
    EndSessionRequest, HistoryResponse, SendMessageRequest, SendMessageResponse, decode_body,
    decode_confirmation,
};
use super::{ApiError, ConversationApi, EndConfirmation, ErrorClassifier, HistoryPage, SendReply, WidgetServerConfig};

#[derive(Debug, Clone)]
pub struct HttpConversationClient {
    client: Client,
    base_url: String,
    widget_key: Option<String>,
    classifier: ErrorClassifier,
}

impl HttpConversationClient {
    pub fn new(config: &WidgetConfig) -> Result<Self> {
        let classifier = config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            widget_key: config.widget_key.clone(),
            classifier,
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.widget_key {
            Some(key) => request.header(WIDGET_KEY_HEADER, key),
            None => request,
        }
    }

    /// Send the request and return the status and body of a 2xx response
    async fn execute(
        &self,
        request: RequestBuilder,
        endpoint: &str,
        session_id: &str,
    ) -> std::result::Result<(u16, String), ApiError> {
        logging::log_remote_call_start(endpoint, session_id);

        let response = match self.with_key(request).send().await {
            Ok(response) => response,
            Err(e) => {
                logging::log_remote_call_error(endpoint, session_id, &e.to_string());
                return Err(ApiError::transport(e.to_string()));
            }
        };

        let status = response.status();
        // A body that cannot be read after the status arrived is a transport failure
        let body = response.text().await.map_err(|e| {
            logging::log_remote_call_error(endpoint, session_id, &e.to_string());
            ApiError::transport(e.to_string())
        })?;

        if !status.is_success() {
            let error = self.classifier.classify(status.as_u16(), &body);
            logging::log_remote_call_error(endpoint, session_id, &error.to_string());
            return Err(error);
        }

        Ok((status.as_u16(), body))
    }
}

#[async_trait]
impl ConversationApi for HttpConversationClient {
    async fn send_message(&self, session_id: &str, text: &str) -> std::result::Result<SendReply, ApiError> {
        let request = self.client.post(self.url(routes::SEND_MESSAGE)).json(&SendMessageRequest {
            session_id: session_id.to_string(),
            message: text.to_string(),
        });

        let (status, body) = self.execute(request, routes::SEND_MESSAGE, session_id).await?;
        decode_body::<SendMessageResponse>(status, &body).map(SendReply::from)
    }

    async fn fetch_history(&self, session_id: &str) -> std::result::Result<HistoryPage, ApiError> {
        let url = format!(
            "{}/{}",
            self.url(routes::HISTORY),
            urlencoding::encode(session_id)
        );

        let (status, body) = self.execute(self.client.get(url), routes::HISTORY, session_id).await?;
        decode_body::<HistoryResponse>(status, &body).map(HistoryPage::from)
    }

    async fn end_session(&self, session_id: &str) -> std::result::Result<EndConfirmation, ApiError> {
        let request = self.client.post(self.url(routes::END_SESSION)).json(&EndSessionRequest {
            session_id: session_id.to_string(),
        });

        let (_, body) = self.execute(request, routes::END_SESSION, session_id).await?;
        Ok(decode_confirmation(&body))
    }

    async fn fetch_config(&self) -> std::result::Result<WidgetServerConfig, ApiError> {
        let (status, body) = self
            .execute(self.client.get(self.url(routes::CONFIG)), routes::CONFIG, "")
            .await?;
        decode_body(status, &body)
    }
}
