use std::time::Duration;

use anyhow::Context;
use axum::http::HeaderValue;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-20b";
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 4] = [
  "http://localhost:5173",
  "http://localhost:3000",
  "http://127.0.0.1:5173",
  "http://localhost:5174",
];

/// Controls whether error responses carry diagnostic fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
  Development,
  Production,
}

impl RunMode {
  fn parse(value: Option<&str>) -> Self {
    match value {
      Some(v) if v.eq_ignore_ascii_case("development") => RunMode::Development,
      _ => RunMode::Production,
    }
  }

  pub fn is_development(self) -> bool {
    self == RunMode::Development
  }
}

/// Process configuration, read once at startup and handed to the router.
#[derive(Clone)]
pub struct AppConfig {
  pub port: u16,
  pub api_key: Option<String>,
  pub base_url: String,
  pub default_model: String,
  pub allowed_origins: Vec<HeaderValue>,
  pub run_mode: RunMode,
  pub upstream_timeout: Option<Duration>,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      port: DEFAULT_PORT,
      api_key: None,
      base_url: DEFAULT_BASE_URL.to_string(),
      default_model: DEFAULT_MODEL.to_string(),
      allowed_origins: DEFAULT_ALLOWED_ORIGINS
        .into_iter()
        .map(HeaderValue::from_static)
        .collect(),
      run_mode: RunMode::Production,
      upstream_timeout: None,
    }
  }
}

impl AppConfig {
  pub fn from_env() -> anyhow::Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Builds the config from an arbitrary key lookup. Blank values count as unset.
  pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let var = |key: &str| {
      lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    };
    let defaults = Self::default();

    let port = match var("PORT") {
      Some(raw) => raw
        .parse::<u16>()
        .with_context(|| format!("invalid PORT value: {raw}"))?,
      None => defaults.port,
    };

    let allowed_origins = match var("CORS_ALLOWED_ORIGINS") {
      Some(raw) => parse_origins(&raw)?,
      None => defaults.allowed_origins,
    };

    let upstream_timeout = match var("UPSTREAM_TIMEOUT_SECS") {
      Some(raw) => {
        let secs = raw
          .parse::<u64>()
          .with_context(|| format!("invalid UPSTREAM_TIMEOUT_SECS value: {raw}"))?;
        Some(Duration::from_secs(secs))
      }
      None => None,
    };

    Ok(Self {
      port,
      api_key: var("UPSTREAM_API_KEY"),
      base_url: var("UPSTREAM_BASE_URL").unwrap_or(defaults.base_url),
      default_model: var("DEFAULT_MODEL").unwrap_or(defaults.default_model),
      allowed_origins,
      run_mode: RunMode::parse(var("APP_ENV").as_deref()),
      upstream_timeout,
    })
  }
}

fn parse_origins(raw: &str) -> anyhow::Result<Vec<HeaderValue>> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|origin| !origin.is_empty())
    .map(|origin| {
      HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin: {origin}"))
    })
    .collect()
}
