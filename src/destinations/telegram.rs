//! Telegram Bot API transport over reqwest.
//!
//! The bot token is part of the request URL, so URLs are stripped from every
//! reqwest error before it is turned into a message.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use super::transport::{BotIdentity, DeliveryTransport, DestinationCredentials, TransportError};
use crate::config::DeliveryConfig;
use crate::error::{AppError, AppResult};
use crate::sources::Artifact;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: i64,
    first_name: String,
    username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramTransport {
    client: reqwest::Client,
    api_base_url: String,
}

impl TelegramTransport {
    pub fn new(config: &DeliveryConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("telebackup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal {
                source: anyhow::Error::from(e),
            })?;

        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn method_url(&self, credentials: &DestinationCredentials, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base_url, credentials.bot_token.as_str(), method)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        method: &str,
    ) -> Result<Option<T>, TransportError> {
        let response = request.send().await.map_err(|e| request_error(method, e))?;
        let status = response.status();
        let body: Option<ApiResponse<T>> = response.json().await.ok();

        match body {
            Some(body) if status.is_success() && body.ok => Ok(body.result),
            // Some proxies answer 200 with an empty body
            None if status.is_success() => Ok(None),
            Some(body) => Err(classify_response(
                method,
                status,
                body.description,
                body.parameters.and_then(|p| p.retry_after),
            )),
            None => Err(classify_response(method, status, None, None)),
        }
    }
}

fn request_error(method: &str, error: reqwest::Error) -> TransportError {
    let error = error.without_url();
    let message = format!("{method}: {error}");
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        TransportError::transient(message)
    } else {
        TransportError::permanent(message)
    }
}

pub(crate) fn classify_response(
    method: &str,
    status: StatusCode,
    description: Option<String>,
    retry_after: Option<u64>,
) -> TransportError {
    let description = description.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected response")
            .to_string()
    });
    let message = format!("{method}: HTTP {}: {description}", status.as_u16());

    if status == StatusCode::TOO_MANY_REQUESTS {
        TransportError::Transient {
            message,
            retry_after: retry_after.map(Duration::from_secs),
        }
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        TransportError::transient(message)
    } else {
        TransportError::permanent(message)
    }
}

#[async_trait]
impl DeliveryTransport for TelegramTransport {
    async fn send_document(
        &self,
        credentials: &DestinationCredentials,
        artifact: &Artifact,
        caption: &str,
    ) -> Result<(), TransportError> {
        let file = tokio::fs::File::open(&artifact.path)
            .await
            .map_err(|e| TransportError::permanent(format!("open artifact: {e}")))?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let document = Part::stream_with_length(body, artifact.size)
            .file_name(artifact.file_name.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| TransportError::permanent(format!("sendDocument: {}", e.without_url())))?;

        let form = Form::new()
            .text("chat_id", credentials.chat_id.to_string())
            .text("caption", caption.to_string())
            .text("parse_mode", "HTML")
            .part("document", document);

        let request = self
            .client
            .post(self.method_url(credentials, "sendDocument"))
            .multipart(form);
        self.call::<serde_json::Value>(request, "sendDocument").await?;
        Ok(())
    }

    async fn send_message(
        &self,
        credentials: &DestinationCredentials,
        text: &str,
    ) -> Result<(), TransportError> {
        let request = self
            .client
            .post(self.method_url(credentials, "sendMessage"))
            .json(&serde_json::json!({
                "chat_id": credentials.chat_id.as_str(),
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }));
        self.call::<serde_json::Value>(request, "sendMessage").await?;
        Ok(())
    }

    async fn verify(&self, credentials: &DestinationCredentials) -> Result<BotIdentity, TransportError> {
        let request = self.client.get(self.method_url(credentials, "getMe"));
        let user: ApiUser = self
            .call(request, "getMe")
            .await?
            .ok_or_else(|| TransportError::permanent("getMe: response carried no bot"))?;

        Ok(BotIdentity {
            id: user.id,
            username: user.username,
            first_name: user.first_name,
        })
    }
}
