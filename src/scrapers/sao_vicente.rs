//! Supermercados São Vicente flyer scraper.
//!
//! Only the Salto store's flyer grid (`#Salto`) is followed. Each grid item
//! carries a desktop image wrapped in a link that opens the PDF in a new tab.

use super::{Discovery, base_url, resolved_href};
use crate::error::Result;
use crate::fetch::Fetch;
use crate::models::FlyerLink;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

pub const LISTING_URL: &str = "https://www.svicente.com.br/ofertas";

static FLYER_CARD: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "#Salto div.experience-saoVicente_layouts-gridItem div.viewFlyer_component div.img_desktop",
    )
    .unwrap()
});
static NEW_TAB_LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[target=_blank]").unwrap());

/// PDF URL of each flyer card, using the first new-tab link in the card.
pub fn parse_listing(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&FLYER_CARD)
        .filter_map(|card| card.select(&NEW_TAB_LINK).next())
        .filter_map(|a| resolved_href(a, base))
        .collect()
}

#[instrument(level = "info", skip_all)]
pub async fn discover<F: Fetch>(fetcher: &F) -> Result<Discovery> {
    let base = base_url(LISTING_URL)?;
    let html = fetcher.get_text(LISTING_URL).await?;
    let urls = parse_listing(&html, &base);
    debug!(urls = ?urls, "São Vicente flyer URLs");
    Ok(Discovery {
        links: urls.into_iter().map(FlyerLink::pdf).collect(),
        skipped: Vec::new(),
    })
}
