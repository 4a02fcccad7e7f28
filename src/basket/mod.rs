//! Dual-mode shopping basket.
//!
//! A guest basket lives in the durable client-side store. Once a user
//! authenticates, [`BasketStore::merge`] replays the guest lines into the
//! server-side basket exactly once and the store switches to operating
//! against the server for the rest of the session.

mod error;
mod local;
mod remote;
mod store;
mod types;

pub use error::{BasketError, MergeError};
pub use local::LOCAL_BASKET_KEY;
pub use store::BasketStore;
pub use types::{basket_total, BasketLine, BasketMode, LineId, ProductId, ProductRef, UserId};
