//! Cache key derivation.

use reqwest::Method;
use std::fmt;

/// Cache key for a read request, `"{METHOD}_{path}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
  /// Key for a request. Only reads are ever stored under it.
  pub fn for_request(method: &Method, path: &str) -> Self {
    Self(format!("{}_{}", method.as_str(), path))
  }

  /// Prefix shared by every cached read of the resource a path belongs to.
  ///
  /// The resource is the run of word characters right after `root/`, so with
  /// root `/api` both `/api/products/7` and `/api/products?page=2` map to
  /// `GET_/api/products`. Paths outside the root have no resource.
  pub fn resource_prefix(path: &str, root: &str) -> Option<String> {
    let root = root.trim_end_matches('/');
    let rest = path.strip_prefix(root)?.strip_prefix('/')?;

    let end = rest
      .find(|c: char| !(c.is_alphanumeric() || c == '_'))
      .unwrap_or(rest.len());
    let resource = &rest[..end];
    if resource.is_empty() {
      return None;
    }

    Some(format!("{}_{}/{}", Method::GET.as_str(), root, resource))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_request_key() {
    let key = CacheKey::for_request(&Method::GET, "/api/products?page=2");
    assert_eq!(key.as_str(), "GET_/api/products?page=2");
  }

  #[test]
  fn test_resource_prefix() {
    assert_eq!(
      CacheKey::resource_prefix("/api/basket/17", "/api").as_deref(),
      Some("GET_/api/basket")
    );
    assert_eq!(
      CacheKey::resource_prefix("/api/products?page=2", "/api/").as_deref(),
      Some("GET_/api/products")
    );
    assert_eq!(
      CacheKey::resource_prefix("/api/order_items", "/api").as_deref(),
      Some("GET_/api/order_items")
    );
  }

  #[test]
  fn test_resource_prefix_outside_root() {
    assert_eq!(CacheKey::resource_prefix("/cart", "/api"), None);
    assert_eq!(CacheKey::resource_prefix("/api", "/api"), None);
    assert_eq!(CacheKey::resource_prefix("/api/", "/api"), None);
    assert_eq!(CacheKey::resource_prefix("/apix/products", "/api"), None);
  }
}
