//! Error types for each concern, plus the HTTP mapping used by handlers.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

/// Bad caller input. Surfaced immediately; no provider is called.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
  #[error("text must not be empty")]
  EmptyText,

  #[error("text is too short to summarize ({actual} chars, minimum {min})")]
  TextTooShort { min: usize, actual: usize },

  #[error("quiz type is required")]
  MissingQuizType,

  #[error("quiz type must be multiple_choice or essay (got '{0}')")]
  InvalidQuizType(String),

  #[error("question count must be positive (got {0})")]
  InvalidCount(i64),
}

/// Failure of a single provider attempt. Never reaches the caller.
#[derive(Error, Debug)]
pub enum ProviderError {
  #[error("provider not configured: {0}")]
  NotConfigured(String),

  #[error("network error: {0}")]
  Network(#[from] reqwest::Error),

  #[error("timed out after {0:?}")]
  Timeout(std::time::Duration),

  #[error("authentication rejected: {0}")]
  Auth(String),

  #[error("rate limited by provider: {0}")]
  RateLimited(String),

  #[error("HTTP {status}: {message}")]
  Status { status: u16, message: String },

  #[error("empty response")]
  EmptyResponse,

  #[error("malformed JSON: {0}")]
  Malformed(String),

  #[error("unexpected response shape: {0}")]
  Shape(String),
}

impl ProviderError {
  pub fn shape(message: impl Into<String>) -> Self {
    ProviderError::Shape(message.into())
  }

  /// Classify a non-2xx provider response.
  pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
    match status.as_u16() {
      401 | 403 => ProviderError::Auth(message),
      429 => ProviderError::RateLimited(message),
      code => ProviderError::Status { status: code, message },
    }
  }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
  #[error("only PDF files are accepted")]
  NotPdf,

  #[error("file exceeds the {max_mb} MB limit")]
  TooLarge { max_mb: usize },

  #[error("file payload is not valid base64: {0}")]
  InvalidBase64(String),

  #[error("could not parse PDF: {0}")]
  Unparsable(String),

  #[error("PDF is encrypted")]
  Encrypted,

  #[error("no extractable text found (scanned or image-only PDF?)")]
  NoText,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
  #[error("record not found")]
  NotFound,

  #[error("store unavailable: {0}")]
  Unavailable(String),
}

/// What an HTTP handler can fail with.
#[derive(Error, Debug)]
pub enum ApiError {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Extraction(#[from] ExtractionError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error("too many requests, try again in a minute")]
  RateLimited,

  #[error("missing x-user-id header")]
  Unauthorized,

  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::Validation(_) => StatusCode::BAD_REQUEST,
      ApiError::Extraction(_) => StatusCode::BAD_REQUEST,
      ApiError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
      ApiError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
      ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(target: "study_assistant", error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_codes_are_classified() {
    let auth = ProviderError::from_status(reqwest::StatusCode::UNAUTHORIZED, "bad key".into());
    assert!(matches!(auth, ProviderError::Auth(_)));

    let limited = ProviderError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down".into());
    assert!(matches!(limited, ProviderError::RateLimited(_)));

    let other = ProviderError::from_status(reqwest::StatusCode::BAD_GATEWAY, "upstream".into());
    assert!(matches!(other, ProviderError::Status { status: 502, .. }));
  }

  #[test]
  fn api_errors_map_to_http_status() {
    assert_eq!(ApiError::from(ValidationError::EmptyText).status(), StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::from(StoreError::NotFound).status(), StatusCode::NOT_FOUND);
    assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(ApiError::from(ExtractionError::Encrypted).status(), StatusCode::BAD_REQUEST);
  }
}
