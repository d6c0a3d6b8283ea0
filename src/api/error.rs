use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(StatusCode),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unexpected response body: {0}")]
    UnexpectedBody(&'static str),
    #[error("response did not contain a message")]
    MissingMessage,
    #[error("server returned an unusable message: {0}")]
    InvalidRecord(#[from] RecordError),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A snapshot entry that could not be turned into a [`Message`](super::models::Message).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {index}: {kind}")]
pub struct RecordError {
    pub index: usize,
    pub kind: RecordErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordErrorKind {
    #[error("not a JSON object")]
    NotAnObject,
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    #[error("empty wa_id")]
    EmptyWaId,
    #[error("unparseable timestamp `{0}`")]
    InvalidTimestamp(String),
    #[error("unknown status `{0}`")]
    InvalidStatus(String),
}
