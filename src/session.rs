//! Client context and persisted identity.
//!
//! A [`ClientContext`] bundles the handles every storefront component
//! shares: the durable store, the response cache and the bearer credential.
//! It is constructed once and passed explicitly to the transport and the
//! basket store.

use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::basket::UserId;
use crate::cache::ResponseCache;
use crate::config::CacheConfig;
use crate::store::KeyValueStore;

const TOKEN_KEY: &str = "authToken";
const USER_KEY: &str = "authUser";

/// Shared bearer token.
#[derive(Debug, Clone, Default)]
pub struct Credential(Arc<RwLock<Option<String>>>);

impl Credential {
  pub fn get(&self) -> Option<String> {
    self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
  }

  pub fn set(&self, token: Option<String>) {
    *self.0.write().unwrap_or_else(PoisonError::into_inner) = token;
  }
}

/// Who is logged in, as far as this client knows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
  pub identifier: Option<UserId>,
  pub credential: Option<String>,
}

impl AuthState {
  pub fn is_authenticated(&self) -> bool {
    self.identifier.is_some()
  }
}

/// Handles shared by the transport and the basket store.
#[derive(Clone)]
pub struct ClientContext {
  store: Arc<dyn KeyValueStore>,
  cache: Arc<ResponseCache>,
  credential: Credential,
}

impl ClientContext {
  pub fn new(cache_config: CacheConfig, store: Arc<dyn KeyValueStore>) -> Self {
    let cache = Arc::new(ResponseCache::new(cache_config, Arc::clone(&store)));
    Self::with_cache(store, cache)
  }

  pub fn with_cache(store: Arc<dyn KeyValueStore>, cache: Arc<ResponseCache>) -> Self {
    Self {
      store,
      cache,
      credential: Credential::default(),
    }
  }

  pub fn store(&self) -> &Arc<dyn KeyValueStore> {
    &self.store
  }

  pub fn cache(&self) -> &Arc<ResponseCache> {
    &self.cache
  }

  pub fn credential(&self) -> &Credential {
    &self.credential
  }

  /// Restore the identity persisted by a previous login.
  pub async fn restore(&self) -> AuthState {
    let credential = self.read(TOKEN_KEY).await;
    let identifier = self.read(USER_KEY).await.map(UserId::new);

    self.credential.set(credential.clone());
    debug!(authenticated = identifier.is_some(), "Restored session");
    AuthState {
      identifier,
      credential,
    }
  }

  /// Record a successful authentication.
  pub async fn login(&self, user: UserId, token: String) -> AuthState {
    self.credential.set(Some(token.clone()));
    self.write(TOKEN_KEY, &token).await;
    self.write(USER_KEY, user.as_str()).await;

    AuthState {
      identifier: Some(user),
      credential: Some(token),
    }
  }

  /// Forget the current identity.
  pub async fn logout(&self) {
    self.credential.set(None);
    for key in [TOKEN_KEY, USER_KEY] {
      if let Err(e) = self.store.remove_item(key).await {
        warn!(key, error = %e, "Failed to remove persisted session");
      }
    }
  }

  async fn read(&self, key: &str) -> Option<String> {
    match self.store.get_item(key).await {
      Ok(value) => value.filter(|v| !v.is_empty()),
      Err(e) => {
        warn!(key, error = %e, "Failed to read persisted session");
        None
      }
    }
  }

  async fn write(&self, key: &str, value: &str) {
    if let Err(e) = self.store.set_item(key, value).await {
      warn!(key, error = %e, "Failed to persist session");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;

  fn context(store: Arc<dyn KeyValueStore>) -> ClientContext {
    ClientContext::new(CacheConfig::default(), store)
  }

  #[tokio::test]
  async fn test_restore_without_session() {
    let ctx = context(Arc::new(MemoryStore::new()));
    let auth = ctx.restore().await;

    assert!(!auth.is_authenticated());
    assert_eq!(ctx.credential().get(), None);
  }

  #[tokio::test]
  async fn test_login_persists_across_contexts() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let first = context(Arc::clone(&store));
    let auth = first.login(UserId::new("42"), "tok".to_string()).await;
    assert!(auth.is_authenticated());
    assert_eq!(first.credential().get().as_deref(), Some("tok"));

    let second = context(store);
    let restored = second.restore().await;
    assert_eq!(restored, auth);
    assert_eq!(second.credential().get().as_deref(), Some("tok"));
  }

  #[tokio::test]
  async fn test_logout_forgets_identity() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let ctx = context(Arc::clone(&store));
    ctx.login(UserId::new("42"), "tok".to_string()).await;

    ctx.logout().await;

    assert_eq!(ctx.credential().get(), None);
    assert_eq!(context(store).restore().await, AuthState::default());
  }
}
