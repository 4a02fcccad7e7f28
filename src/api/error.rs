//! Transport error types.

use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors surfaced by a request.
#[derive(Error, Debug)]
pub enum ApiError {
  /// No response reached the client (connection refused, DNS, timeout).
  #[error("network error: {message} ({url})")]
  Transport { url: String, message: String },

  /// The server answered with a non-2xx status.
  #[error("{message}")]
  Http {
    status: u16,
    message: String,
    /// Field name to message, when the server reported validation failures
    validation_errors: Option<BTreeMap<String, String>>,
    url: String,
  },

  /// A success response whose body is not JSON.
  #[error("invalid response body from {url}: {source}")]
  Decode {
    url: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid request url: {0}")]
  InvalidUrl(#[from] url::ParseError),

  #[error("invalid header {0}")]
  InvalidHeader(String),
}

impl ApiError {
  /// HTTP status, for errors where the server responded.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Http { status, .. } => Some(*status),
      _ => None,
    }
  }

  pub fn validation_errors(&self) -> Option<&BTreeMap<String, String>> {
    match self {
      Self::Http {
        validation_errors, ..
      } => validation_errors.as_ref(),
      _ => None,
    }
  }

  pub fn is_transport(&self) -> bool {
    matches!(self, Self::Transport { .. })
  }

  /// Build an `Http` error from a non-2xx response body.
  ///
  /// The backend answers with `{message, error, validationErrors}`; when
  /// validation errors are present they are folded into the message so a
  /// caller that only displays the message still shows them.
  pub(crate) fn from_response(status: StatusCode, url: &str, body: &str) -> Self {
    let (message, validation_errors) = match serde_json::from_str::<Value>(body) {
      Ok(data) => describe_error_body(&data),
      Err(_) => (body.trim().to_string(), None),
    };

    let message = if message.is_empty() {
      format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
      )
    } else {
      message
    };

    Self::Http {
      status: status.as_u16(),
      message,
      validation_errors,
      url: url.to_string(),
    }
  }
}

fn describe_error_body(data: &Value) -> (String, Option<BTreeMap<String, String>>) {
  let text = |field: &str| data.get(field).and_then(Value::as_str).map(str::to_string);

  if let Some(fields) = data.get("validationErrors").and_then(Value::as_object) {
    let errors: BTreeMap<String, String> = fields
      .iter()
      .map(|(field, msg)| {
        let msg = msg.as_str().map(str::to_string).unwrap_or_else(|| msg.to_string());
        (field.clone(), msg)
      })
      .collect();

    let list = errors
      .iter()
      .map(|(field, msg)| format!("{}: {}", field, msg))
      .collect::<Vec<_>>()
      .join(", ");
    let headline = text("message").unwrap_or_else(|| "Validation failed".to_string());
    return (format!("{}: {}", headline, list), Some(errors));
  }

  let message = text("message")
    .or_else(|| text("error"))
    .unwrap_or_else(|| data.to_string());
  (message, None)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_validation_errors_fold_into_message() {
    let err = ApiError::from_response(
      StatusCode::BAD_REQUEST,
      "http://shop/api/basket",
      r#"{"message":"Invalid basket item","validationErrors":{"quantity":"must be positive","productId":"required"}}"#,
    );

    assert_eq!(err.status(), Some(400));
    assert_eq!(
      err.to_string(),
      "Invalid basket item: productId: required, quantity: must be positive"
    );
    let fields = err.validation_errors().unwrap();
    assert_eq!(fields["quantity"], "must be positive");
  }

  #[test]
  fn test_validation_without_message() {
    let err = ApiError::from_response(
      StatusCode::UNPROCESSABLE_ENTITY,
      "u",
      r#"{"validationErrors":{"email":"taken"}}"#,
    );
    assert_eq!(err.to_string(), "Validation failed: email: taken");
  }

  #[test]
  fn test_message_then_error_then_raw_json() {
    let msg = ApiError::from_response(StatusCode::NOT_FOUND, "u", r#"{"message":"Not here"}"#);
    assert_eq!(msg.to_string(), "Not here");

    let err = ApiError::from_response(StatusCode::FORBIDDEN, "u", r#"{"error":"Forbidden"}"#);
    assert_eq!(err.to_string(), "Forbidden");

    let raw = ApiError::from_response(StatusCode::CONFLICT, "u", r#"{"code":7}"#);
    assert_eq!(raw.to_string(), r#"{"code":7}"#);
    assert!(raw.validation_errors().is_none());
  }

  #[test]
  fn test_plain_text_and_empty_bodies() {
    let text = ApiError::from_response(StatusCode::BAD_GATEWAY, "u", "upstream down\n");
    assert_eq!(text.to_string(), "upstream down");

    let empty = ApiError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "u", "");
    assert_eq!(empty.to_string(), "HTTP 500: Internal Server Error");
  }
}
