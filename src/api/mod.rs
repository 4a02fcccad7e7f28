//! Storefront HTTP transport.
//!
//! Everything that talks to the backend goes through [`Transport::request`],
//! the `api(path, options)` primitive. [`ApiClient`] is the production
//! implementation: it attaches the bearer credential, serves reads from the
//! response cache, and invalidates cached reads of a resource after a
//! successful write to it.

mod client;
mod error;
mod transport;

pub use client::ApiClient;
pub use error::ApiError;
pub use transport::{RequestOptions, Transport};
