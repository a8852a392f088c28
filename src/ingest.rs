//! Content-addressed ingestion: hash, check, stage, record.
//!
//! A flyer is identified only by the SHA-256 of its bytes. The same bytes
//! seen again, from any market and under any filename, are a duplicate and
//! leave no trace. Different bytes under a colliding filename are always new.
//!
//! # Ordering
//!
//! Bytes are staged before the record is inserted. If the insert fails the
//! staged file is removed again, so a failure never leaves a record without
//! a staged flyer (which would suppress the flyer forever). A crash between
//! the two steps leaves an unrecorded staged file, which the next run simply
//! ingests again.

use crate::error::Result;
use crate::models::Market;
use crate::staging::StagingArea;
use crate::store::FlyerStore;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

/// Lowercase hex SHA-256 of `bytes`.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// What ingesting one resource did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    /// The fingerprint was already recorded; nothing was written.
    Duplicate { fingerprint: String },
    /// New content, staged at `path` and recorded.
    New { fingerprint: String, path: PathBuf },
}

impl Ingested {
    pub fn already_existed(&self) -> bool {
        matches!(self, Ingested::Duplicate { .. })
    }

    pub fn fingerprint(&self) -> &str {
        match self {
            Ingested::Duplicate { fingerprint } | Ingested::New { fingerprint, .. } => fingerprint,
        }
    }
}

pub struct Ingestor<'a, S> {
    store: &'a S,
    staging: &'a StagingArea,
}

impl<'a, S: FlyerStore> Ingestor<'a, S> {
    pub fn new(store: &'a S, staging: &'a StagingArea) -> Self {
        Self { store, staging }
    }

    /// Ingest `bytes` for `market`, staging them at `filename` when new.
    ///
    /// # Arguments
    ///
    /// * `market` - Source the bytes came from; recorded with the fingerprint
    /// * `filename` - Path relative to the market's staging directory
    /// * `bytes` - Raw flyer content
    ///
    /// # Returns
    ///
    /// [`Ingested::Duplicate`] when the fingerprint is already recorded,
    /// otherwise [`Ingested::New`] with the staged path. Staging and store
    /// failures are returned as errors and leave neither a record nor a file.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let ingestor = Ingestor::new(&store, &staging);
    /// let first = ingestor.ingest(Market::Roldao, "ofertas.pdf", b"%PDF").await?;
    /// let again = ingestor.ingest(Market::Delta, "1/0-0.jpg", b"%PDF").await?;
    /// assert!(!first.already_existed());
    /// assert!(again.already_existed());
    /// ```
    #[instrument(level = "info", skip(self, bytes), fields(%market, bytes = bytes.len()))]
    pub async fn ingest(&self, market: Market, filename: &str, bytes: &[u8]) -> Result<Ingested> {
        let fingerprint = fingerprint(bytes);

        if self.store.contains(&fingerprint).await? {
            debug!(%fingerprint, "Already ingested");
            return Ok(Ingested::Duplicate { fingerprint });
        }

        let path = self.staging.write(market, filename, bytes).await?;

        match self.store.insert(&fingerprint, market.name()).await {
            Ok(true) => {
                info!(%fingerprint, path = %path.display(), "Ingested new flyer");
                Ok(Ingested::New { fingerprint, path })
            }
            Ok(false) => {
                // Recorded between our lookup and insert.
                self.staging.discard(&path).await;
                Ok(Ingested::Duplicate { fingerprint })
            }
            Err(e) => {
                warn!(%fingerprint, error = %e, "Record insert failed; discarding staged file");
                self.staging.discard(&path).await;
                Err(e)
            }
        }
    }
}
