//! reqwest-backed transport with transparent response caching.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

use super::{ApiError, RequestOptions, Transport};
use crate::cache::{CacheKey, ResponseCache};
use crate::config::ApiConfig;
use crate::session::{ClientContext, Credential};

/// Storefront API client.
///
/// Reads are served from the response cache when a live entry exists and
/// stored in it on success. Successful writes drop every cached read of the
/// resource named by the first path segment after the API root.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: String,
  root: String,
  cache: Arc<ResponseCache>,
  credential: Credential,
}

impl ApiClient {
  pub fn new(config: &ApiConfig, context: &ClientContext) -> Result<Self, ApiError> {
    // Validate once so every request URL is well-formed
    Url::parse(&config.base_url)?;

    let http = reqwest::Client::builder()
      .timeout(config.timeout())
      .build()
      .map_err(|e| ApiError::Transport {
        url: config.base_url.clone(),
        message: e.to_string(),
      })?;

    Ok(Self {
      http,
      base_url: config.base_url.trim_end_matches('/').to_string(),
      root: config.root.clone(),
      cache: Arc::clone(context.cache()),
      credential: context.credential().clone(),
    })
  }

  pub fn cache(&self) -> &Arc<ResponseCache> {
    &self.cache
  }

  fn headers(&self, options: &RequestOptions) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    if let Some(token) = self.credential.get() {
      let value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| ApiError::InvalidHeader(AUTHORIZATION.to_string()))?;
      headers.insert(AUTHORIZATION, value);
    }

    for (name, value) in &options.headers {
      let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ApiError::InvalidHeader(name.clone()))?;
      let value =
        HeaderValue::from_str(value).map_err(|_| ApiError::InvalidHeader(name.to_string()))?;
      headers.insert(name, value);
    }

    Ok(headers)
  }

  async fn send(&self, url: &str, options: &RequestOptions) -> Result<Value, ApiError> {
    let mut request = self
      .http
      .request(options.method.clone(), url)
      .headers(self.headers(options)?);
    if let Some(body) = &options.body {
      request = request.body(body.to_string());
    }

    debug!(method = %options.method, url, "API request");
    let response = request.send().await.map_err(|e| {
      warn!(method = %options.method, url, error = %e, "API request failed to reach server");
      ApiError::Transport {
        url: url.to_string(),
        message: e.to_string(),
      }
    })?;

    let status = response.status();
    let body = response.bytes().await.map_err(|e| ApiError::Transport {
      url: url.to_string(),
      message: e.to_string(),
    })?;

    if !status.is_success() {
      let err = ApiError::from_response(status, url, &String::from_utf8_lossy(&body));
      warn!(method = %options.method, url, status = status.as_u16(), error = %err, "API error response");
      return Err(err);
    }

    debug!(method = %options.method, url, status = status.as_u16(), "API response");
    if body.iter().all(u8::is_ascii_whitespace) {
      return Ok(Value::Null);
    }
    serde_json::from_slice(&body).map_err(|source| ApiError::Decode {
      url: url.to_string(),
      source,
    })
  }
}

#[async_trait]
impl Transport for ApiClient {
  async fn request(&self, path: &str, options: RequestOptions) -> Result<Value, ApiError> {
    let key = CacheKey::for_request(&options.method, path);

    if options.is_read() {
      if let Some(cached) = self.cache.get(key.as_str()).await {
        debug!(path, "Cache hit");
        return Ok(cached);
      }
    }

    let url = format!("{}{}", self.base_url, path);
    Url::parse(&url)?;
    let data = self.send(&url, &options).await?;

    if options.is_read() {
      // An empty body is not worth serving from the cache
      if !data.is_null() {
        self.cache.set(key.as_str(), data.clone()).await;
      }
    } else if options.is_mutation() {
      if let Some(prefix) = CacheKey::resource_prefix(path, &self.root) {
        self.cache.invalidate(&prefix).await;
      }
    }

    Ok(data)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::CacheConfig;
  use crate::store::MemoryStore;
  use mockito::{Matcher, Server};
  use serde_json::json;

  fn client_for(base_url: &str) -> (ApiClient, ClientContext) {
    let context = ClientContext::new(CacheConfig::default(), Arc::new(MemoryStore::new()));
    let config = ApiConfig {
      base_url: base_url.to_string(),
      ..ApiConfig::default()
    };
    let client = ApiClient::new(&config, &context).unwrap();
    (client, context)
  }

  #[tokio::test]
  async fn test_get_is_cached_after_first_response() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/api/products")
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"[{"id":1,"name":"Lamp"}]"#)
      .expect(1)
      .create_async()
      .await;

    let (client, context) = client_for(&server.url());
    let first = client.request("/api/products", RequestOptions::get()).await.unwrap();
    let second = client.request("/api/products", RequestOptions::get()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(first, json!([{"id": 1, "name": "Lamp"}]));
    assert_eq!(first, second);
    assert_eq!(context.cache().stats().hits, 1);
  }

  #[tokio::test]
  async fn test_bearer_credential_attached() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/api/orders")
      .match_header("authorization", "Bearer secret-token")
      .match_header("content-type", "application/json")
      .with_status(200)
      .with_body("[]")
      .create_async()
      .await;

    let (client, context) = client_for(&server.url());
    context.credential().set(Some("secret-token".to_string()));
    client.request("/api/orders", RequestOptions::get()).await.unwrap();

    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_no_authorization_without_credential() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/api/products")
      .match_header("authorization", Matcher::Missing)
      .with_status(200)
      .with_body("[]")
      .create_async()
      .await;

    let (client, _) = client_for(&server.url());
    client.request("/api/products", RequestOptions::get()).await.unwrap();

    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_mutation_invalidates_resource_reads() {
    let mut server = Server::new_async().await;
    let basket = server
      .mock("GET", "/api/basket/user/42")
      .with_status(200)
      .with_body("[]")
      .expect(2)
      .create_async()
      .await;
    let products = server
      .mock("GET", "/api/products")
      .with_status(200)
      .with_body("[]")
      .expect(1)
      .create_async()
      .await;
    let post = server
      .mock("POST", "/api/basket")
      .match_body(Matcher::Json(json!({"productId": 3, "quantity": 1})))
      .with_status(201)
      .with_body(r#"{"id":5,"product":{"id":3},"quantity":1}"#)
      .create_async()
      .await;

    let (client, context) = client_for(&server.url());
    client.request("/api/basket/user/42", RequestOptions::get()).await.unwrap();
    client.request("/api/products", RequestOptions::get()).await.unwrap();
    assert_eq!(context.cache().len(), 2);

    client
      .request(
        "/api/basket",
        RequestOptions::post(json!({"productId": 3, "quantity": 1})),
      )
      .await
      .unwrap();
    post.assert_async().await;
    assert_eq!(context.cache().len(), 1);

    // Basket read goes back to the network, products stay cached
    client.request("/api/basket/user/42", RequestOptions::get()).await.unwrap();
    client.request("/api/products", RequestOptions::get()).await.unwrap();
    basket.assert_async().await;
    products.assert_async().await;
  }

  #[tokio::test]
  async fn test_http_error_carries_status_and_fields() {
    let mut server = Server::new_async().await;
    server
      .mock("POST", "/api/basket")
      .with_status(400)
      .with_body(r#"{"message":"Invalid","validationErrors":{"quantity":"must be at least 1"}}"#)
      .create_async()
      .await;

    let (client, context) = client_for(&server.url());
    context.cache().set("GET_/api/basket/user/1", json!([])).await;
    let err = client
      .request("/api/basket", RequestOptions::post(json!({"quantity": 0})))
      .await
      .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert!(!err.is_transport());
    assert_eq!(err.to_string(), "Invalid: quantity: must be at least 1");
    // A failed write does not invalidate
    assert_eq!(context.cache().len(), 1);
  }

  #[tokio::test]
  async fn test_failed_read_is_not_cached() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/api/products/9")
      .with_status(404)
      .with_body(r#"{"message":"Product not found"}"#)
      .expect(2)
      .create_async()
      .await;

    let (client, context) = client_for(&server.url());
    for _ in 0..2 {
      let err = client
        .request("/api/products/9", RequestOptions::get())
        .await
        .unwrap_err();
      assert_eq!(err.status(), Some(404));
    }

    mock.assert_async().await;
    assert!(context.cache().is_empty());
  }

  #[tokio::test]
  async fn test_empty_success_body_is_null() {
    let mut server = Server::new_async().await;
    server
      .mock("DELETE", "/api/basket/5")
      .with_status(204)
      .create_async()
      .await;

    let (client, _) = client_for(&server.url());
    let value = client
      .request("/api/basket/5", RequestOptions::delete())
      .await
      .unwrap();
    assert_eq!(value, Value::Null);
  }

  #[tokio::test]
  async fn test_empty_read_is_not_cached() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("GET", "/api/basket/user/42")
      .with_status(204)
      .expect(2)
      .create_async()
      .await;

    let (client, context) = client_for(&server.url());
    for _ in 0..2 {
      let value = client
        .request("/api/basket/user/42", RequestOptions::get())
        .await
        .unwrap();
      assert_eq!(value, Value::Null);
    }

    mock.assert_async().await;
    assert!(context.cache().is_empty());
  }

  #[tokio::test]
  async fn test_unreachable_server_is_transport_error() {
    let (client, _) = client_for("http://127.0.0.1:1");
    let err = client
      .request("/api/products", RequestOptions::get())
      .await
      .unwrap_err();

    assert!(err.is_transport());
    assert_eq!(err.status(), None);
  }

  #[tokio::test]
  async fn test_non_json_success_is_decode_error() {
    let mut server = Server::new_async().await;
    server
      .mock("GET", "/api/products")
      .with_status(200)
      .with_body("<html>")
      .create_async()
      .await;

    let (client, context) = client_for(&server.url());
    let err = client
      .request("/api/products", RequestOptions::get())
      .await
      .unwrap_err();
    assert!(matches!(err, ApiError::Decode { .. }));
    assert!(context.cache().is_empty());
  }

  #[test]
  fn test_invalid_base_url_rejected() {
    let context = ClientContext::new(CacheConfig::default(), Arc::new(MemoryStore::new()));
    let config = ApiConfig {
      base_url: "not a url".to_string(),
      ..ApiConfig::default()
    };
    assert!(matches!(
      ApiClient::new(&config, &context),
      Err(ApiError::InvalidUrl(_))
    ));
  }
}
