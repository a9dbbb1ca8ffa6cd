use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use thiserror::Error;

use crate::config::RunMode;
use crate::models::ErrorBody;
use crate::upstream::UpstreamError;

pub const INVALID_MESSAGES: &str = "Missing or invalid messages array.";
pub const RATE_LIMITED: &str = "Rate limit exceeded. Please try again in a moment.";
pub const AUTH_FAILED: &str = "Authentication failed. Please check API key.";
pub const INVALID_MODEL: &str = "Invalid model specified.";
pub const UNKNOWN_ERROR: &str = "Unknown error occurred";
pub const INTERNAL_ERROR: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum ProxyError {
  #[error("Missing or invalid messages array.")]
  InvalidMessages { received: &'static str, body: Value },

  #[error("upstream chat completion failed: {source}")]
  Upstream { source: UpstreamError, body: Value },

  #[error("internal error: {message}")]
  Internal { message: String },
}

impl ProxyError {
  /// Renders the error. Diagnostic fields (`details`, `requestBody`) are only
  /// filled in development mode.
  pub fn render(self, mode: RunMode) -> Response {
    let dev = mode.is_development();
    let (status, body) = match self {
      ProxyError::InvalidMessages { received, body } => (
        StatusCode::BAD_REQUEST,
        ErrorBody {
          error: INVALID_MESSAGES.to_string(),
          received: Some(received),
          details: None,
          request_body: dev.then_some(body),
        },
      ),
      ProxyError::Upstream { source, body } => {
        let (status, error) = classify(&source);
        (
          status,
          ErrorBody {
            error,
            received: None,
            details: dev.then_some(source.message),
            request_body: dev.then_some(body),
          },
        )
      }
      ProxyError::Internal { message } => (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorBody {
          error: INTERNAL_ERROR.to_string(),
          received: None,
          details: dev.then_some(message),
          request_body: None,
        },
      ),
    };

    (status, Json(body)).into_response()
  }
}

/// Maps an upstream failure to the status and message returned to the caller.
///
/// Structured status/code are checked first. The substring fallback depends on
/// the provider's wording, so a provider or client upgrade can shift results.
pub fn classify(err: &UpstreamError) -> (StatusCode, String) {
  let rate_limited = || (StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED.to_string());
  let auth_failed = || (StatusCode::UNAUTHORIZED, AUTH_FAILED.to_string());
  let invalid_model = || (StatusCode::BAD_REQUEST, INVALID_MODEL.to_string());

  match err.status {
    Some(429) => return rate_limited(),
    Some(401) => return auth_failed(),
    _ => {}
  }
  if matches!(
    err.code.as_deref(),
    Some("model_not_found" | "model_decommissioned")
  ) {
    return invalid_model();
  }

  let message = err.message.to_lowercase();
  if message.contains("rate limit") {
    rate_limited()
  } else if message.contains("authentication") {
    auth_failed()
  } else if message.contains("model") {
    invalid_model()
  } else if err.message.trim().is_empty() {
    (StatusCode::INTERNAL_SERVER_ERROR, UNKNOWN_ERROR.to_string())
  } else {
    (StatusCode::INTERNAL_SERVER_ERROR, err.message.clone())
  }
}
