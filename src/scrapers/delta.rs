//! Delta Supermercados flyer scraper.
//!
//! Delta publishes flyers as image galleries rather than PDFs. The offers
//! page for the Salto store lists one card per flyer; each card links to a
//! page whose `.gallery-item` entries link the full-size images. Images are
//! named `{card}-{item}.jpg` so a flyer's pages stay together and ordered.

use super::{Discovery, base_url, resolved_href};
use crate::error::Result;
use crate::fetch::Fetch;
use crate::models::FlyerLink;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

pub const LISTING_URL: &str = "https://www.deltasuper.com.br/ofertas-salto/";

static LISTING_ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse(".jet-listing-grid__item").unwrap());
static GALLERY_ITEM: Lazy<Selector> = Lazy::new(|| Selector::parse(".gallery-item").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

/// `(card index, flyer page URL)` for every listing card that has a link.
pub fn parse_listing(html: &str, base: &Url) -> Vec<(usize, String)> {
    let document = Html::parse_document(html);
    document
        .select(&LISTING_ITEM)
        .enumerate()
        .filter_map(|(i, card)| {
            let link = card.select(&LINK).next()?;
            Some((i, resolved_href(link, base)?))
        })
        .collect()
}

/// `(item index, image URL)` for every gallery entry on a flyer page.
pub fn parse_gallery(html: &str, base: &Url) -> Vec<(usize, String)> {
    let document = Html::parse_document(html);
    document
        .select(&GALLERY_ITEM)
        .enumerate()
        .filter_map(|(j, item)| {
            let link = item.select(&LINK).next()?;
            Some((j, resolved_href(link, base)?))
        })
        .collect()
}

async fn gallery_links<F: Fetch>(fetcher: &F, card: usize, page_url: &str) -> Result<Vec<FlyerLink>> {
    let base = base_url(page_url)?;
    let html = fetcher.get_text(page_url).await?;
    Ok(parse_gallery(&html, &base)
        .into_iter()
        .map(|(item, url)| FlyerLink::image(url, format!("{card}-{item}.jpg")))
        .collect())
}

#[instrument(level = "info", skip_all)]
pub async fn discover<F: Fetch>(fetcher: &F) -> Result<Discovery> {
    let base = base_url(LISTING_URL)?;
    let html = fetcher.get_text(LISTING_URL).await?;
    let cards = parse_listing(&html, &base);
    debug!(cards = cards.len(), "Delta flyer cards");

    let results: Vec<(String, Result<Vec<FlyerLink>>)> = stream::iter(cards)
        .then(|(card, page_url)| async move {
            let links = gallery_links(fetcher, card, &page_url).await;
            (page_url, links)
        })
        .collect()
        .await;

    let mut discovery = Discovery::default();
    for (page_url, result) in results {
        match result {
            Ok(links) => discovery.links.extend(links),
            Err(e) => {
                warn!(page = %page_url, error = %e, kind = e.kind(), "Skipping Delta flyer page");
                discovery.skipped.push(format!("{page_url}: {e}"));
            }
        }
    }
    Ok(discovery)
}
