//! Basket store: one contract over the local and remote backings.

use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::{BasketError, MergeError};
use super::local::LocalBasket;
use super::remote::RemoteBasket;
use super::types::{basket_total, BasketLine, BasketMode, LineId, ProductRef, UserId};
use crate::api::Transport;
use crate::cache::{CacheKey, ResponseCache};
use crate::session::{AuthState, ClientContext};
use crate::store::KeyValueStore;

/// The single point where the basket mode is dispatched on.
enum Backing {
  Local(LocalBasket),
  Remote(RemoteBasket),
}

#[derive(Clone)]
struct Snapshot {
  mode: BasketMode,
  lines: Vec<BasketLine>,
}

/// Source of truth for the shopping basket.
///
/// Every operation holds the backing lock for its whole duration, so
/// operations on one store apply strictly in call order and never overlap.
/// The published snapshot only changes once an operation has succeeded.
/// Local mutations start from the stored guest basket, so a store that has
/// not been loaded yet never overwrites lines written earlier.
pub struct BasketStore {
  api: Arc<dyn Transport>,
  store: Arc<dyn KeyValueStore>,
  cache: Arc<ResponseCache>,
  api_root: String,
  backing: Mutex<Backing>,
  snapshot: RwLock<Snapshot>,
}

impl BasketStore {
  /// Create a store for the current session.
  ///
  /// An already-authenticated session (e.g. restored after a restart)
  /// starts in remote mode without merging; otherwise the guest basket is used.
  pub fn new(context: &ClientContext, api: Arc<dyn Transport>, auth: &AuthState) -> Self {
    Self::with_api_root(context, api, auth, "/api")
  }

  pub fn with_api_root(
    context: &ClientContext,
    api: Arc<dyn Transport>,
    auth: &AuthState,
    api_root: &str,
  ) -> Self {
    let store = Arc::clone(context.store());
    let (backing, mode) = match &auth.identifier {
      Some(user) => (
        Backing::Remote(RemoteBasket::new(Arc::clone(&api), user.clone(), api_root)),
        BasketMode::Remote { user: user.clone() },
      ),
      None => (Backing::Local(LocalBasket::new(Arc::clone(&store))), BasketMode::Local),
    };

    Self {
      api,
      store,
      cache: Arc::clone(context.cache()),
      api_root: api_root.to_string(),
      backing: Mutex::new(backing),
      snapshot: RwLock::new(Snapshot {
        mode,
        lines: Vec::new(),
      }),
    }
  }

  /// Current lines.
  pub fn lines(&self) -> Vec<BasketLine> {
    self.read_snapshot().lines
  }

  /// Sum of `price * quantity` over all lines.
  pub fn total(&self) -> f64 {
    basket_total(&self.read_snapshot().lines)
  }

  pub fn mode(&self) -> BasketMode {
    self.read_snapshot().mode
  }

  fn read_snapshot(&self) -> Snapshot {
    self
      .snapshot
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  fn publish(&self, mode: BasketMode, lines: Vec<BasketLine>) {
    *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Snapshot { mode, lines };
  }

  /// The stored guest basket, or the current lines if it cannot be read.
  async fn local_lines(&self, local: &LocalBasket) -> Vec<BasketLine> {
    match local.read().await {
      Ok(lines) => lines,
      Err(e) => {
        warn!(error = %e, "Failed to read local basket, using current lines");
        self.lines()
      }
    }
  }

  fn publish_lines(&self, lines: Vec<BasketLine>) {
    self
      .snapshot
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .lines = lines;
  }

  /// Replace the in-memory basket with the backing's contents.
  ///
  /// A local store that cannot be read leaves the current lines in place.
  pub async fn load(&self) -> Result<Vec<BasketLine>, BasketError> {
    let backing = self.backing.lock().await;
    let lines = match &*backing {
      Backing::Local(local) => match local.read().await {
        Ok(lines) => lines,
        Err(e) => {
          warn!(error = %e, "Failed to read local basket, keeping current lines");
          return Ok(self.lines());
        }
      },
      Backing::Remote(remote) => remote
        .load()
        .await
        .map_err(BasketError::request("load basket"))?,
    };

    debug!(lines = lines.len(), "Basket loaded");
    self.publish_lines(lines.clone());
    Ok(lines)
  }

  /// Add `quantity` of `product`, accumulating onto an existing line for it.
  ///
  /// Returns the resulting line. In remote mode that is the server's line,
  /// adopted as-is.
  pub async fn add_line(&self, product: ProductRef, quantity: u32) -> Result<BasketLine, BasketError> {
    if quantity == 0 {
      return Err(BasketError::InvalidQuantity);
    }

    let mut backing = self.backing.lock().await;
    let (line, lines) = match &mut *backing {
      Backing::Local(local) => {
        let mut lines = self.local_lines(local).await;
        let line = match lines.iter_mut().find(|l| l.product.id == product.id) {
          Some(existing) => {
            existing.quantity = existing.quantity.saturating_add(quantity);
            existing.clone()
          }
          None => {
            let line = BasketLine {
              id: local.next_id(&lines),
              product,
              quantity,
            };
            lines.push(line.clone());
            line
          }
        };
        local.write(&lines).await;
        (line, lines)
      }
      Backing::Remote(remote) => {
        let line = remote
          .add(product.id, quantity)
          .await
          .map_err(BasketError::request("add item to basket"))?;
        let mut lines = self.lines();
        adopt(&mut lines, line.clone());
        (line, lines)
      }
    };

    self.publish_lines(lines);
    Ok(line)
  }

  /// Set a line's quantity. Values below 1 are clamped to 1.
  pub async fn update_quantity(&self, id: &LineId, quantity: i64) -> Result<BasketLine, BasketError> {
    let quantity = clamp_quantity(quantity);

    let backing = self.backing.lock().await;
    let mut lines = match &*backing {
      Backing::Local(local) => self.local_lines(local).await,
      Backing::Remote(_) => self.lines(),
    };
    let index = lines
      .iter()
      .position(|line| &line.id == id)
      .ok_or_else(|| BasketError::LineNotFound(id.clone()))?;

    let line = match &*backing {
      Backing::Local(local) => {
        lines[index].quantity = quantity;
        local.write(&lines).await;
        lines[index].clone()
      }
      Backing::Remote(remote) => {
        let line = remote
          .update(id, quantity)
          .await
          .map_err(BasketError::request("update quantity"))?;
        lines[index] = line.clone();
        line
      }
    };

    self.publish_lines(lines);
    Ok(line)
  }

  /// Remove a line. Removing a line that is not in the basket does nothing.
  pub async fn remove_line(&self, id: &LineId) -> Result<(), BasketError> {
    let backing = self.backing.lock().await;
    let mut lines = match &*backing {
      Backing::Local(local) => self.local_lines(local).await,
      Backing::Remote(_) => self.lines(),
    };
    if !lines.iter().any(|line| &line.id == id) {
      debug!(line = %id, "Line not in basket, nothing to remove");
      return Ok(());
    }
    lines.retain(|line| &line.id != id);

    match &*backing {
      Backing::Local(local) => local.write(&lines).await,
      Backing::Remote(remote) => remote
        .remove(id)
        .await
        .map_err(BasketError::request("remove item from basket"))?,
    }

    self.publish_lines(lines);
    Ok(())
  }

  /// Empty the basket.
  pub async fn clear(&self) -> Result<(), BasketError> {
    let backing = self.backing.lock().await;
    match &*backing {
      Backing::Local(local) => local.write(&[]).await,
      Backing::Remote(remote) => remote
        .clear()
        .await
        .map_err(BasketError::request("clear basket"))?,
    }

    self.publish_lines(Vec::new());
    Ok(())
  }

  /// Move the guest basket into `user`'s server basket.
  ///
  /// Guest lines are added one at a time, in order, so the server's quantity
  /// accumulation sees each add after the previous one has completed. On
  /// success the guest basket is removed, the store switches to remote mode
  /// and the server basket is loaded, since its post-merge state wins over
  /// the client's view.
  ///
  /// If a line fails, the remaining lines are not attempted and the store
  /// stays in local mode. Lines merged before the failure remain on the
  /// server.
  pub async fn merge(&self, user: UserId) -> Result<Vec<BasketLine>, BasketError> {
    let mut backing = self.backing.lock().await;
    let local = match &*backing {
      Backing::Local(local) => local,
      Backing::Remote(remote) => return Err(BasketError::AlreadyRemote(remote.user().clone())),
    };

    let pending = local.read().await.unwrap_or_else(|e| {
      warn!(error = %e, "Failed to read local basket for merge, treating it as empty");
      Vec::new()
    });

    let remote = RemoteBasket::new(Arc::clone(&self.api), user.clone(), &self.api_root);
    info!(user = %user, lines = pending.len(), "Merging guest basket");

    let mut merged = Vec::with_capacity(pending.len());
    for line in &pending {
      if let Err(source) = remote.add(line.product.id, line.quantity).await {
        warn!(user = %user, product = %line.product.id, merged = merged.len(), error = %source, "Basket merge aborted");
        return Err(
          MergeError {
            merged,
            failed: line.product.id,
            source,
          }
          .into(),
        );
      }
      merged.push(line.product.id);
    }

    local.clear().await;
    *backing = Backing::Remote(remote.clone());
    self.publish(BasketMode::Remote { user: user.clone() }, Vec::new());

    // Reads of the basket cached before the merge no longer reflect the server
    if let Some(prefix) = CacheKey::resource_prefix(&remote.resource_path(), &self.api_root) {
      self.cache.invalidate(&prefix).await;
    }

    let lines = remote
      .load()
      .await
      .map_err(BasketError::request("load basket"))?;
    info!(user = %user, merged = merged.len(), lines = lines.len(), "Basket merge complete");
    self.publish_lines(lines.clone());
    Ok(lines)
  }

  /// Drop the session's basket and start a fresh guest basket.
  pub async fn logout(&self) {
    let mut backing = self.backing.lock().await;
    let local = LocalBasket::new(Arc::clone(&self.store));
    local.clear().await;
    *backing = Backing::Local(local);
    self.publish(BasketMode::Local, Vec::new());
  }
}

fn clamp_quantity(quantity: i64) -> u32 {
  quantity.clamp(1, i64::from(u32::MAX)) as u32
}

/// Put a server-returned line in place of the line with the same id or
/// product, or append it.
fn adopt(lines: &mut Vec<BasketLine>, line: BasketLine) {
  let existing = lines
    .iter()
    .position(|l| l.id == line.id)
    .or_else(|| lines.iter().position(|l| l.product.id == line.product.id));
  match existing {
    Some(index) => lines[index] = line,
    None => lines.push(line),
  }
}
