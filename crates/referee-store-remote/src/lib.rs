//! Remote hosted-table backend for Referee.
//!
//! Talks to a PostgREST endpoint (as exposed by Supabase) over HTTPS with
//! [`reqwest`]. The table uses the underscored column spelling
//! (`MS_Number`, `Date_Invited`, ...).

mod config;
mod store;

pub mod error;

pub use config::RemoteConfig;
pub use error::{Error, Result};
pub use store::RemoteStore;
