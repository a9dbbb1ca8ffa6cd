use std::any::Any;
use std::future::{Future, IntoFuture};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{AppConfig, RunMode};
use crate::error::ProxyError;
use crate::models::{ChatRequest, CompletionRequest, HealthResponse};
use crate::upstream::ChatUpstream;

pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub struct AppState<U> {
  pub config: AppConfig,
  pub upstream: U,
}

pub fn build_router<U: ChatUpstream>(state: AppState<U>) -> Router {
  let mode = state.config.run_mode;
  let cors = CorsLayer::new()
    .allow_origin(AllowOrigin::list(state.config.allowed_origins.clone()))
    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
    .allow_headers(AllowHeaders::mirror_request())
    .allow_credentials(true);

  Router::new()
    .route("/health", get(health))
    .route("/api/chat", post(chat::<U>))
    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
    .layer(CatchPanicLayer::custom(
      move |panic: Box<dyn Any + Send + 'static>| panic_response(panic, mode),
    ))
    .layer(cors)
    .with_state(Arc::new(state))
}

/// Serves until `shutdown` resolves. In-flight requests are dropped, not drained.
pub async fn run_router<U, F>(
  listener: TcpListener,
  state: AppState<U>,
  shutdown: F,
) -> anyhow::Result<()>
where
  U: ChatUpstream,
  F: Future<Output = ()>,
{
  let app = build_router(state);
  tokio::select! {
    result = axum::serve(listener, app).into_future() => result?,
    _ = shutdown => info!("Chat proxy shutting down"),
  }
  Ok(())
}

async fn health() -> Json<HealthResponse> {
  Json(HealthResponse {
    status: "OK",
    timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
  })
}

async fn chat<U: ChatUpstream>(
  State(state): State<Arc<AppState<U>>>,
  headers: HeaderMap,
  payload: Result<Bytes, BytesRejection>,
) -> Response {
  let span = info_span!("chat", request_id = %Uuid::new_v4());
  match proxy_chat(&state, &headers, payload).instrument(span).await {
    Ok(body) => (StatusCode::OK, Json(body)).into_response(),
    Err(err) => err.render(state.config.run_mode),
  }
}

async fn proxy_chat<U: ChatUpstream>(
  state: &AppState<U>,
  headers: &HeaderMap,
  payload: Result<Bytes, BytesRejection>,
) -> Result<Value, ProxyError> {
  let bytes = payload.map_err(|rejection| {
    warn!(status = %rejection.status(), "rejected chat request body: {}", rejection.body_text());
    ProxyError::Internal {
      message: rejection.body_text(),
    }
  })?;
  let body = parse_body(headers, &bytes).map_err(|err| {
    warn!(error = %err, "chat request body is not valid JSON");
    ProxyError::Internal {
      message: err.to_string(),
    }
  })?;
  debug!(body = %body, "incoming chat request");

  let request = match ChatRequest::from_body(&body) {
    Ok(request) => request,
    Err(received) => {
      error!(received, "missing or invalid messages array");
      return Err(ProxyError::InvalidMessages { received, body });
    }
  };

  let model = request
    .model
    .unwrap_or_else(|| state.config.default_model.clone());
  info!(model = %model, message_count = request.messages.len(), "forwarding chat completion");

  match state
    .upstream
    .complete(CompletionRequest::new(model, request.messages))
    .await
  {
    Ok(completion) => {
      info!("upstream response received");
      Ok(completion)
    }
    Err(source) => {
      error!(error = %source, "upstream chat completion failed");
      Err(ProxyError::Upstream { source, body })
    }
  }
}

/// Bodies that are empty or not sent as `application/json` read as `{}`, so
/// they fall through to the missing-messages check.
fn parse_body(headers: &HeaderMap, bytes: &[u8]) -> Result<Value, serde_json::Error> {
  if !is_json(headers) || bytes.iter().all(u8::is_ascii_whitespace) {
    return Ok(Value::Object(Map::new()));
  }
  serde_json::from_slice(bytes)
}

fn is_json(headers: &HeaderMap) -> bool {
  headers
    .get(CONTENT_TYPE)
    .and_then(|value| value.to_str().ok())
    .and_then(|value| value.split(';').next())
    .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>, mode: RunMode) -> Response {
  let message = if let Some(s) = panic.downcast_ref::<String>() {
    s.clone()
  } else if let Some(s) = panic.downcast_ref::<&str>() {
    s.to_string()
  } else {
    "request handler panicked".to_string()
  };
  error!(%message, "unhandled panic while serving request");
  ProxyError::Internal { message }.render(mode)
}
