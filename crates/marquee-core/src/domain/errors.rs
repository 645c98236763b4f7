//! Errors - コンテナに還元されるエラー値と分類

use serde::{Deserialize, Serialize};
use std::fmt;

/// ErrorKind は失敗の分類
///
/// - Session: 401 系。資格情報をクリアしてリダイレクト（インライン表示しない）
/// - Operation: それ以外のリモート呼び出し失敗
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Session,
    Operation,
}

/// Error value reduced into a container's `error` field and carried by
/// rejected operation envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorPayload {
    pub fn operation(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Operation,
            message: message.into(),
            status: None,
        }
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Session,
            message: message.into(),
            status: Some(401),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_session(&self) -> bool {
        self.kind == ErrorKind::Session
    }
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ErrorPayload {}
