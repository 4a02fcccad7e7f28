//! The request primitive and its options.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use super::ApiError;

/// Options for a single request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
  pub method: Method,
  /// Extra headers; these override the defaults
  pub headers: Vec<(String, String)>,
  pub body: Option<Value>,
}

impl RequestOptions {
  pub fn get() -> Self {
    Self::default()
  }

  pub fn post(body: Value) -> Self {
    Self::with_body(Method::POST, body)
  }

  pub fn put(body: Value) -> Self {
    Self::with_body(Method::PUT, body)
  }

  pub fn patch(body: Value) -> Self {
    Self::with_body(Method::PATCH, body)
  }

  pub fn delete() -> Self {
    Self {
      method: Method::DELETE,
      ..Self::default()
    }
  }

  fn with_body(method: Method, body: Value) -> Self {
    Self {
      method,
      headers: Vec::new(),
      body: Some(body),
    }
  }

  pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// Reads are the only requests whose responses are cached.
  pub fn is_read(&self) -> bool {
    self.method == Method::GET
  }

  /// Writes invalidate cached reads of the resource they touch.
  pub fn is_mutation(&self) -> bool {
    [Method::POST, Method::PUT, Method::PATCH, Method::DELETE].contains(&self.method)
  }
}

/// The network primitive consumed by the basket store and every other caller.
///
/// A single failed call surfaces immediately; there is no retry.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Issue a request for `path` (relative to the backend base URL) and
  /// return the parsed JSON body. An empty success body yields `Value::Null`.
  async fn request(&self, path: &str, options: RequestOptions) -> Result<Value, ApiError>;
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_method_classification() {
    assert!(RequestOptions::get().is_read());
    assert!(!RequestOptions::get().is_mutation());
    assert!(RequestOptions::post(json!({})).is_mutation());
    assert!(RequestOptions::put(json!({})).is_mutation());
    assert!(RequestOptions::patch(json!({})).is_mutation());
    assert!(RequestOptions::delete().is_mutation());

    let head = RequestOptions {
      method: Method::HEAD,
      ..RequestOptions::default()
    };
    assert!(!head.is_read());
    assert!(!head.is_mutation());
  }
}
