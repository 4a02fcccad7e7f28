//! Guest basket persisted in the durable store.

use std::sync::Arc;
use tracing::warn;

use super::types::{BasketLine, LineId};
use crate::store::{KeyValueStore, StorageError};

/// Durable key holding the serialized guest basket.
pub const LOCAL_BASKET_KEY: &str = "shopping_basket";

pub(crate) struct LocalBasket {
  store: Arc<dyn KeyValueStore>,
  counter: u64,
}

impl LocalBasket {
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self { store, counter: 0 }
  }

  /// Read the stored line list. An absent key is an empty basket.
  pub async fn read(&self) -> Result<Vec<BasketLine>, StorageError> {
    match self.store.get_item(LOCAL_BASKET_KEY).await? {
      Some(raw) => Ok(serde_json::from_str(&raw)?),
      None => Ok(Vec::new()),
    }
  }

  /// Persist `lines`. Failures are logged; the caller keeps its in-memory copy.
  pub async fn write(&self, lines: &[BasketLine]) {
    let result = match serde_json::to_string(lines) {
      Ok(raw) => self.store.set_item(LOCAL_BASKET_KEY, &raw).await,
      Err(e) => Err(e.into()),
    };
    if let Err(e) = result {
      warn!(error = %e, "Failed to persist local basket");
    }
  }

  pub async fn clear(&self) {
    if let Err(e) = self.store.remove_item(LOCAL_BASKET_KEY).await {
      warn!(error = %e, "Failed to clear local basket");
    }
  }

  /// Synthesize a line id not used by any of `lines`.
  pub fn next_id(&mut self, lines: &[BasketLine]) -> LineId {
    loop {
      self.counter += 1;
      let id = LineId::new(format!("local-{}-{:08x}", self.counter, rand::random::<u32>()));
      if !lines.iter().any(|line| line.id == id) {
        return id;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::basket::{ProductId, ProductRef};
  use crate::store::MemoryStore;

  #[tokio::test]
  async fn test_absent_key_reads_empty() {
    let local = LocalBasket::new(Arc::new(MemoryStore::new()));
    assert!(local.read().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_corrupt_basket_is_an_error() {
    let store = Arc::new(MemoryStore::new());
    store.set_item(LOCAL_BASKET_KEY, "{not json").await.unwrap();
    let local = LocalBasket::new(store);
    assert!(matches!(local.read().await, Err(StorageError::Serialize(_))));
  }

  #[tokio::test]
  async fn test_write_then_read() {
    let local = LocalBasket::new(Arc::new(MemoryStore::new()));
    let lines = vec![BasketLine {
      id: LineId::new("local-1-0000abcd"),
      product: ProductRef::new(ProductId(4)).with_price(2.5),
      quantity: 3,
    }];

    local.write(&lines).await;
    assert_eq!(local.read().await.unwrap(), lines);

    local.clear().await;
    assert!(local.read().await.unwrap().is_empty());
  }

  #[test]
  fn test_next_id_is_unique_within_list() {
    let mut local = LocalBasket::new(Arc::new(MemoryStore::new()));
    let mut lines: Vec<BasketLine> = Vec::new();
    for n in 0..50 {
      let id = local.next_id(&lines);
      assert!(id.as_str().starts_with("local-"));
      assert!(lines.iter().all(|line| line.id != id));
      lines.push(BasketLine {
        id,
        product: ProductRef::new(ProductId(n)),
        quantity: 1,
      });
    }
  }
}
