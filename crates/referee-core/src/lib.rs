//! Core types and reconciliation logic for the Referee manuscript tracker.
//!
//! This crate has no HTTP or database dependencies. Store
//! backends (`referee-store-*`) implement the traits in [`store`]; the
//! [`reconcile`] module brings any two of them into agreement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod identity;
pub mod normalize;
pub mod reconcile;
pub mod record;
pub mod resolve;
pub mod store;
pub mod view;

#[cfg(test)]
mod testing;

pub use error::{Result, SyncError};
pub use record::{CompositeKey, ManuscriptRecord};
