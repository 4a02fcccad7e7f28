//! Server-side basket of an authenticated user.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

use super::types::{BasketLine, LineId, ProductId, UserId};
use crate::api::{ApiError, RequestOptions, Transport};

#[derive(Clone)]
pub(crate) struct RemoteBasket {
  api: Arc<dyn Transport>,
  user: UserId,
  root: String,
}

impl RemoteBasket {
  pub fn new(api: Arc<dyn Transport>, user: UserId, root: &str) -> Self {
    Self {
      api,
      user,
      root: root.trim_end_matches('/').to_string(),
    }
  }

  pub fn user(&self) -> &UserId {
    &self.user
  }

  /// Path prefix of every basket resource.
  pub fn resource_path(&self) -> String {
    format!("{}/basket", self.root)
  }

  fn user_path(&self) -> String {
    format!("{}/user/{}", self.resource_path(), self.user)
  }

  fn line_path(&self, line: &LineId) -> String {
    format!("{}/{}", self.resource_path(), line)
  }

  /// The user id as the backend expects it: numeric when it is one.
  fn user_json(&self) -> Value {
    match self.user.as_str().parse::<u64>() {
      Ok(n) => json!(n),
      Err(_) => json!(self.user.as_str()),
    }
  }

  pub async fn load(&self) -> Result<Vec<BasketLine>, ApiError> {
    let path = self.user_path();
    let body = self.api.request(&path, RequestOptions::get()).await?;
    if body.is_null() {
      return Ok(Vec::new());
    }
    decode(&path, body)
  }

  /// Add `quantity` of `product`; the server accumulates onto an existing line.
  pub async fn add(&self, product: ProductId, quantity: u32) -> Result<BasketLine, ApiError> {
    let path = self.resource_path();
    let body = json!({
      "userId": self.user_json(),
      "productId": product,
      "quantity": quantity,
    });
    let line = self.api.request(&path, RequestOptions::post(body)).await?;
    decode(&path, line)
  }

  pub async fn update(&self, line: &LineId, quantity: u32) -> Result<BasketLine, ApiError> {
    let path = self.line_path(line);
    let body = self
      .api
      .request(&path, RequestOptions::put(json!({ "quantity": quantity })))
      .await?;
    decode(&path, body)
  }

  pub async fn remove(&self, line: &LineId) -> Result<(), ApiError> {
    self
      .api
      .request(&self.line_path(line), RequestOptions::delete())
      .await?;
    Ok(())
  }

  pub async fn clear(&self) -> Result<(), ApiError> {
    self
      .api
      .request(&self.user_path(), RequestOptions::delete())
      .await?;
    Ok(())
  }
}

fn decode<T: DeserializeOwned>(path: &str, body: Value) -> Result<T, ApiError> {
  serde_json::from_value(body).map_err(|source| ApiError::Decode {
    url: path.to_string(),
    source,
  })
}
