//! Content store: the persisted mapping from fingerprint to source.
//!
//! The pipeline only ever asks four things of the store, captured by
//! [`FlyerStore`]. Production uses [`postgres::PgStore`]; tests use
//! [`memory::MemoryStore`].

use crate::error::Result;
use crate::models::FlyerRecord;
use chrono::{DateTime, Utc};

pub mod postgres;

#[cfg(test)]
pub mod memory;

pub trait FlyerStore {
    /// Whether a record with this fingerprint exists.
    async fn contains(&self, id: &str) -> Result<bool>;

    /// Insert a record stamped with the current time.
    ///
    /// Returns `false` when the fingerprint was already present; the existing
    /// row is left untouched.
    async fn insert(&self, id: &str, source: &str) -> Result<bool>;

    /// Remove one record so its content is treated as new again.
    async fn remove(&self, id: &str) -> Result<()>;

    /// Delete every record created strictly before `cutoff`; returns the count removed.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Records created at or after `since`.
    async fn records_since(&self, since: DateTime<Utc>) -> Result<Vec<FlyerRecord>>;
}
