use serde::Serialize;
use serde_json::Value;

pub const TEMPERATURE: f64 = 0.7;
pub const MAX_TOKENS: u32 = 4000;
pub const TOP_P: f64 = 1.0;

/// Inbound chat request. Messages stay opaque JSON so they reach the
/// provider exactly as the client sent them.
#[derive(Clone, Debug)]
pub struct ChatRequest {
  pub messages: Vec<Value>,
  pub model: Option<String>,
}

impl ChatRequest {
  /// Extracts the request from a parsed body. On failure returns the JSON
  /// type name of whatever was found under `messages`.
  pub fn from_body(body: &Value) -> Result<Self, &'static str> {
    let messages = match body.get("messages") {
      Some(Value::Array(messages)) => messages.clone(),
      other => return Err(json_type_name(other)),
    };

    let model = body
      .get("model")
      .and_then(Value::as_str)
      .map(str::trim)
      .filter(|model| !model.is_empty())
      .map(str::to_string);

    Ok(Self { messages, model })
  }
}

fn json_type_name(value: Option<&Value>) -> &'static str {
  match value {
    None => "undefined",
    Some(Value::Null) => "null",
    Some(Value::Bool(_)) => "boolean",
    Some(Value::Number(_)) => "number",
    Some(Value::String(_)) => "string",
    Some(Value::Array(_)) => "array",
    Some(Value::Object(_)) => "object",
  }
}

/// Payload sent to the provider's `/chat/completions` endpoint.
#[derive(Serialize, Clone, Debug)]
pub struct CompletionRequest {
  pub model: String,
  pub messages: Vec<Value>,
  pub temperature: f64,
  pub max_tokens: u32,
  pub top_p: f64,
  pub stream: bool,
}

impl CompletionRequest {
  pub fn new(model: String, messages: Vec<Value>) -> Self {
    Self {
      model,
      messages,
      temperature: TEMPERATURE,
      max_tokens: MAX_TOKENS,
      top_p: TOP_P,
      stream: false,
    }
  }
}

#[derive(Serialize)]
pub struct HealthResponse {
  pub status: &'static str,
  pub timestamp: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
  pub error: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub received: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub request_body: Option<Value>,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn from_body_keeps_message_order_and_model() {
    let body = json!({
      "messages": [
        { "role": "system", "content": "You are MathMentor." },
        { "role": "user", "content": "What is 7 x 8?" }
      ],
      "model": "llama-3.1-8b-instant"
    });
    let req = ChatRequest::from_body(&body).expect("valid body");
    assert_eq!(req.messages.len(), 2);
    assert_eq!(req.messages[0]["role"], "system");
    assert_eq!(req.messages[1]["content"], "What is 7 x 8?");
    assert_eq!(req.model.as_deref(), Some("llama-3.1-8b-instant"));
  }

  #[test]
  fn from_body_does_not_validate_message_shape() {
    let body = json!({ "messages": [42, { "role": "wizard" }] });
    let req = ChatRequest::from_body(&body).expect("shape is not checked");
    assert_eq!(req.messages, vec![json!(42), json!({ "role": "wizard" })]);
  }

  #[test]
  fn from_body_ignores_blank_or_non_string_model() {
    let blank = json!({ "messages": [], "model": "  " });
    assert!(ChatRequest::from_body(&blank).expect("valid").model.is_none());

    let number = json!({ "messages": [], "model": 7 });
    assert!(ChatRequest::from_body(&number).expect("valid").model.is_none());
  }

  #[test]
  fn from_body_reports_received_type() {
    assert_eq!(ChatRequest::from_body(&json!({})).unwrap_err(), "undefined");
    assert_eq!(ChatRequest::from_body(&json!({ "messages": null })).unwrap_err(), "null");
    assert_eq!(ChatRequest::from_body(&json!({ "messages": "hi" })).unwrap_err(), "string");
    assert_eq!(ChatRequest::from_body(&json!({ "messages": {} })).unwrap_err(), "object");
    assert_eq!(ChatRequest::from_body(&json!([1, 2])).unwrap_err(), "undefined");
  }

  #[test]
  fn completion_request_carries_fixed_parameters() {
    let req = CompletionRequest::new(
      "m".to_string(),
      vec![json!({ "role": "user", "content": "hi" })],
    );
    let value = serde_json::to_value(&req).expect("serializes");
    assert_eq!(value["model"], "m");
    assert_eq!(value["temperature"], json!(0.7));
    assert_eq!(value["max_tokens"], json!(4000));
    assert_eq!(value["top_p"], json!(1.0));
    assert_eq!(value["stream"], json!(false));
  }

  #[test]
  fn error_body_omits_absent_fields() {
    let body = ErrorBody {
      error: "boom".to_string(),
      received: None,
      details: None,
      request_body: Some(json!({ "messages": "x" })),
    };
    let value = serde_json::to_value(&body).expect("serializes");
    assert_eq!(value, json!({ "error": "boom", "requestBody": { "messages": "x" } }));
  }
}
