//! Basket error types.

use thiserror::Error;

use super::types::{LineId, ProductId, UserId};
use crate::api::ApiError;

/// Errors surfaced by basket operations.
#[derive(Error, Debug)]
pub enum BasketError {
  /// A server call failed; `op` names the user-facing action.
  #[error("failed to {op}: {source}")]
  Request {
    op: &'static str,
    #[source]
    source: ApiError,
  },

  #[error(transparent)]
  Merge(#[from] MergeError),

  #[error("quantity must be at least 1")]
  InvalidQuantity,

  #[error("basket line {0} not found")]
  LineNotFound(LineId),

  /// The basket was already merged into this user's server basket.
  #[error("basket already belongs to user {0}")]
  AlreadyRemote(UserId),
}

impl BasketError {
  pub(crate) fn request(op: &'static str) -> impl FnOnce(ApiError) -> Self {
    move |source| Self::Request { op, source }
  }
}

/// A guest line could not be merged into the server basket.
///
/// Lines merged before the failure stay on the server; the guest basket is
/// left untouched and the store stays in local mode.
#[derive(Error, Debug)]
#[error(
  "failed to merge product {failed} into the basket after {} line(s) merged: {source}",
  .merged.len()
)]
pub struct MergeError {
  /// Products merged successfully, in merge order
  pub merged: Vec<ProductId>,
  /// The product whose merge failed
  pub failed: ProductId,
  #[source]
  pub source: ApiError,
}
