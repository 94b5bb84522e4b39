//! Filesystem-derived manuscript source.
//!
//! Each handled review is filed as a PDF whose name encodes the manuscript
//! (see [`referee_core::identity`]). This crate lists such a directory and
//! turns every matching filename into a record. It is read-only: PDFs are
//! filed by hand, never by the engine.

mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::DirectoryStore;
