//! RequestGateway - Transport の薄いラッパー
//!
//! - credential の付与（なければヘッダを省略）
//! - 401 の分類（credential をクリアし、SessionObserver に通知）
//! - それ以外の非 2xx はメッセージ付きの汎用エラー
//! - リトライはしない（呼び出し側の責務）

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::domain::{ErrorPayload, UploadForm};
use crate::ports::{
    CredentialStore, Method, ProgressFn, RequestBody, SessionObserver, Transport,
    TransportRequest, TransportResponse,
};

const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("session invalidated")]
    SessionInvalidated,

    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("request failed"))]
    Http { status: u16, message: Option<String> },

    #[error("transport: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Human-readable payload for a rejected envelope; `fallback` is used when
    /// the failure carries no message of its own.
    pub fn to_payload(&self, fallback: &str) -> ErrorPayload {
        match self {
            GatewayError::SessionInvalidated => ErrorPayload::session(SESSION_EXPIRED_MESSAGE),
            GatewayError::Http { status, message } => {
                ErrorPayload::operation(message.clone().unwrap_or_else(|| fallback.to_string()))
                    .with_status(*status)
            }
            GatewayError::Transport(_) | GatewayError::Decode(_) => {
                ErrorPayload::operation(fallback)
            }
        }
    }
}

pub struct RequestGateway {
    base_url: String,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
    session: Arc<dyn SessionObserver>,
}

impl RequestGateway {
    pub fn new(
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
        session: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
            credentials,
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `call(method, path, body?, onProgress?)`
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        progress: Option<ProgressFn>,
    ) -> Result<serde_json::Value, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let request = TransportRequest {
            method,
            url: url.clone(),
            bearer: self.credentials.get(),
            body,
            progress,
        };

        tracing::debug!(%method, %url, "request");
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|err| {
                tracing::warn!(%method, %url, error = %err, "transport failure");
                GatewayError::Transport(err.0)
            })?;
        tracing::debug!(%method, %url, status = response.status, "response");

        self.classify(response)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let value = self.call(Method::Get, path, RequestBody::Empty, None).await?;
        decode(value)
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let value = self.call(Method::Post, path, json_body(body)?, None).await?;
        decode(value)
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let value = self.call(Method::Put, path, json_body(body)?, None).await?;
        decode(value)
    }

    pub async fn delete(&self, path: &str) -> Result<(), GatewayError> {
        self.call(Method::Delete, path, RequestBody::Empty, None)
            .await
            .map(|_| ())
    }

    /// Multipart upload; `progress` receives `(bytes_sent, total_bytes)`.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        path: &str,
        form: UploadForm,
        progress: Option<ProgressFn>,
    ) -> Result<T, GatewayError> {
        let value = self
            .call(Method::Post, path, RequestBody::Multipart(form), progress)
            .await?;
        decode(value)
    }

    fn classify(&self, response: TransportResponse) -> Result<serde_json::Value, GatewayError> {
        if response.status == 401 {
            tracing::warn!("session invalidated; clearing credential");
            self.credentials.clear();
            self.session.session_invalidated();
            return Err(GatewayError::SessionInvalidated);
        }

        if !response.is_success() {
            return Err(GatewayError::Http {
                status: response.status,
                message: server_message(&response.body),
            });
        }

        if response.body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        let value: serde_json::Value = serde_json::from_str(&response.body)
            .map_err(|err| GatewayError::Decode(err.to_string()))?;
        Ok(unwrap_data(value))
    }
}

/// `path?k=v&...` with percent-encoded keys and values.
pub fn with_query(path: &str, pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return path.to_string();
    }
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{query}")
}

/// `{collection}/{id}` with the id percent-encoded as one path segment.
pub fn item_path(collection: &str, id: &str) -> String {
    format!("{collection}/{}", urlencoding::encode(id))
}

fn json_body<B: Serialize>(body: &B) -> Result<RequestBody, GatewayError> {
    serde_json::to_value(body)
        .map(RequestBody::Json)
        .map_err(|err| GatewayError::Decode(format!("failed to encode request body: {err}")))
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(|err| GatewayError::Decode(err.to_string()))
}

/// `{"data": ...}` envelopes are unwrapped; anything else is returned as is.
fn unwrap_data(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(mut map) if map.len() == 1 && map.contains_key("data") => {
            map.remove("data").unwrap_or(serde_json::Value::Null)
        }
        other => other,
    }
}

/// Server message from an error body: `message`, then `error`.
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
        .filter(|m| !m.trim().is_empty())
}
