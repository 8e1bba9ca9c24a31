//! API Request and Response Types
//!
//! Request bodies accepted by the REST routes and the list envelopes they
//! return. Entities themselves are serialized straight from
//! `jobboard-core`.

use serde::{Deserialize, Deserializer};

// Job listing types
mod job_listing;
pub use job_listing::*;

// Application types
mod application;
pub use application::*;

// Per-user and per-member settings
mod settings;
pub use settings::*;

/// Deserialize a field that distinguishes "absent" from "null".
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`: an
/// absent field stays `None`, an explicit `null` becomes `Some(None)`.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
