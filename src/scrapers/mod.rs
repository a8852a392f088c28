//! Site adapters: discover flyer URLs on each supermarket's website.
//!
//! Each adapter follows the same shape:
//!
//! 1. **Parsing**: pure functions over fetched HTML, testable without network
//! 2. **Discovery**: `discover(fetcher)` walks the site and returns [`Discovery`]
//!
//! # Supported Sources
//!
//! | Market | Module | Flyer | Notes |
//! |--------|--------|-------|-------|
//! | Roldão Atacadista | [`roldao`] | PDF | URL hidden in a flipbook config blob on each post |
//! | Supermercados Pague Menos | [`pague_menos`] | PDF | Banner and carousel links |
//! | Delta Supermercados | [`delta`] | JPG | Gallery images, two pages deep |
//! | Supermercados São Vicente | [`sao_vicente`] | PDF | Flyer grid for the Salto store |
//!
//! A failure on the listing page fails the whole adapter; a failure on a
//! single item is logged, recorded in [`Discovery::skipped`] and the adapter
//! moves on to the next item.

use crate::error::{Error, Result};
use crate::fetch::Fetch;
use crate::models::{FlyerLink, Market};
use itertools::Itertools;
use scraper::ElementRef;
use tracing::{info, instrument};
use url::Url;

pub mod delta;
pub mod pague_menos;
pub mod roldao;
pub mod sao_vicente;

/// Links found by one adapter plus the items it had to skip.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub links: Vec<FlyerLink>,
    pub skipped: Vec<String>,
}

/// Run the adapter for `market`, collapsing duplicate links.
#[instrument(level = "info", skip(fetcher), fields(%market))]
pub async fn discover<F: Fetch>(market: Market, fetcher: &F) -> Result<Discovery> {
    let mut discovery = match market {
        Market::Roldao => roldao::discover(fetcher).await?,
        Market::PagueMenos => pague_menos::discover(fetcher).await?,
        Market::Delta => delta::discover(fetcher).await?,
        Market::SaoVicente => sao_vicente::discover(fetcher).await?,
    };
    discovery.links = discovery.links.into_iter().unique_by(|l| l.url.clone()).collect();
    info!(
        links = discovery.links.len(),
        skipped = discovery.skipped.len(),
        "Discovered flyers"
    );
    Ok(discovery)
}

pub(crate) fn base_url(page_url: &str) -> Result<Url> {
    Url::parse(page_url).map_err(|e| Error::Parse(format!("bad page URL {page_url}: {e}")))
}

/// `href` of `element` resolved against `base`, if present and valid.
pub(crate) fn resolved_href(element: ElementRef<'_>, base: &Url) -> Option<String> {
    let href = element.value().attr("href")?.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}
