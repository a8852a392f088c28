//! Data models shared across the pipeline.
//!
//! - [`Market`]: the fixed set of supermarkets the bot follows
//! - [`FlyerRecord`]: the only persisted entity, keyed by content fingerprint
//! - [`FlyerLink`]: what a site adapter discovers
//! - [`SourceOutcome`] / [`RunSummary`]: per-source results aggregated by the runner

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use std::fmt;

/// A supermarket whose flyers are scraped.
///
/// The display name doubles as the staging directory name and as the
/// `source` column of persisted records, so it must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Market {
    Roldao,
    PagueMenos,
    Delta,
    SaoVicente,
}

impl Market {
    /// Every known market, in scraping and reporting order.
    pub const ALL: [Market; 4] = [
        Market::Roldao,
        Market::PagueMenos,
        Market::Delta,
        Market::SaoVicente,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Market::Roldao => "Roldão Atacadista",
            Market::PagueMenos => "Supermercados Pague Menos",
            Market::Delta => "Delta Supermercados",
            Market::SaoVicente => "Supermercados São Vicente",
        }
    }

    pub fn from_name(name: &str) -> Option<Market> {
        Market::ALL.into_iter().find(|m| m.name() == name)
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A persisted fingerprint row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlyerRecord {
    /// Lowercase hex SHA-256 of the flyer bytes.
    pub id: String,
    /// Market display name.
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// What kind of artifact a discovered link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlyerKind {
    /// A PDF that must be rasterized into page images.
    Pdf,
    /// An image that is delivered as is.
    Image,
}

/// A flyer resource discovered by a site adapter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlyerLink {
    /// Absolute resource URL.
    pub url: String,
    /// Destination filename inside the market's staging directory.
    pub filename: String,
    pub kind: FlyerKind,
}

impl FlyerLink {
    pub fn pdf(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: "ofertas.pdf".to_string(),
            kind: FlyerKind::Pdf,
        }
    }

    pub fn image(url: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: filename.into(),
            kind: FlyerKind::Image,
        }
    }
}

/// Result of processing one market during a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceOutcome {
    pub discovered: usize,
    pub new: usize,
    pub duplicates: usize,
    pub failures: Vec<String>,
    pub messages_sent: usize,
}

impl SourceOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Aggregated result of one batch run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub sources: Vec<(Market, SourceOutcome)>,
    pub pruned: u64,
    pub report_sent: bool,
}

impl RunSummary {
    pub fn total_new(&self) -> usize {
        self.sources.iter().map(|(_, o)| o.new).sum()
    }

    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|(_, o)| !o.is_clean()).count()
    }
}
