//! Storefront client core.
//!
//! Two pieces sit between a storefront frontend and its backend API:
//! a two-tier [`cache::ResponseCache`] for read responses, and a
//! [`basket::BasketStore`] that keeps a guest basket locally and merges it
//! into the server basket once the user logs in.

pub mod api;
pub mod basket;
pub mod cache;
pub mod config;
pub mod logging;
pub mod session;
pub mod store;
