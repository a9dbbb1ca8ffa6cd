use std::future::Future;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::AppConfig;
use crate::models::CompletionRequest;

pub const MISSING_KEY_MESSAGE: &str = "upstream API key is missing or empty";

/// Failure reported by the provider or by the HTTP client on the way to it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct UpstreamError {
  pub message: String,
  pub status: Option<u16>,
  pub code: Option<String>,
}

impl UpstreamError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      status: None,
      code: None,
    }
  }
}

impl From<reqwest::Error> for UpstreamError {
  fn from(err: reqwest::Error) -> Self {
    Self {
      message: err.to_string(),
      status: err.status().map(|status| status.as_u16()),
      code: None,
    }
  }
}

/// Anything that can turn a completion request into a provider response body.
pub trait ChatUpstream: Send + Sync + 'static {
  fn complete(
    &self,
    request: CompletionRequest,
  ) -> impl Future<Output = Result<Value, UpstreamError>> + Send;
}

/// OpenAI-compatible `/chat/completions` client.
pub struct HttpUpstream {
  client: reqwest::Client,
  endpoint: String,
  api_key: Option<String>,
}

impl HttpUpstream {
  pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.upstream_timeout {
      builder = builder.timeout(timeout);
    }

    Ok(Self {
      client: builder.build()?,
      endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
      api_key: config.api_key.clone(),
    })
  }
}

impl ChatUpstream for HttpUpstream {
  async fn complete(&self, request: CompletionRequest) -> Result<Value, UpstreamError> {
    let key = self
      .api_key
      .as_deref()
      .filter(|key| !key.trim().is_empty())
      .ok_or_else(|| UpstreamError::new(MISSING_KEY_MESSAGE))?;

    let mut headers = HeaderMap::new();
    headers.insert(
      AUTHORIZATION,
      HeaderValue::from_str(&format!("Bearer {}", key))
        .map_err(|err| UpstreamError::new(err.to_string()))?,
    );

    let resp = self
      .client
      .post(&self.endpoint)
      .headers(headers)
      .json(&request)
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let text = resp.text().await.unwrap_or_default();
      return Err(error_from_response(status.as_u16(), &text));
    }

    Ok(resp.json::<Value>().await?)
  }
}

#[derive(Deserialize)]
struct ProviderErrorBody {
  error: ProviderError,
}

#[derive(Deserialize)]
struct ProviderError {
  message: Option<String>,
  code: Option<Value>,
}

/// Message is `"<status> <detail>"`, preferring the provider's own `error.message`.
fn error_from_response(status: u16, body: &str) -> UpstreamError {
  let parsed = serde_json::from_str::<ProviderErrorBody>(body).ok();
  let code = parsed
    .as_ref()
    .and_then(|p| p.error.code.as_ref())
    .and_then(Value::as_str)
    .map(str::to_string);
  let detail = parsed
    .and_then(|p| p.error.message)
    .filter(|message| !message.trim().is_empty())
    .unwrap_or_else(|| body.trim().to_string());

  let message = if detail.is_empty() {
    format!("{status} status code (no body)")
  } else {
    format!("{status} {detail}")
  };

  UpstreamError {
    message,
    status: Some(status),
    code,
  }
}
