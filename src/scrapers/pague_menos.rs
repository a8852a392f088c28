//! Supermercados Pague Menos flyer scraper.
//!
//! The "jornal de ofertas" page links flyers from a banner shelf and from a
//! carousel. Links are site-relative, absolute, or protocol-relative to a
//! CDN (`//io.convertiez.com.br/...`); all three resolve against the page URL.

use super::{Discovery, base_url, resolved_href};
use crate::error::Result;
use crate::fetch::Fetch;
use crate::models::FlyerLink;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

pub const LISTING_URL: &str = "https://www.superpaguemenos.com.br/jornal-de-ofertas";

static BANNER: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".showcase-shelf-banner .text-center a").unwrap());
static CAROUSEL: Lazy<Selector> = Lazy::new(|| Selector::parse(".owl-stage .item a").unwrap());

/// Flyer URLs on the listing page, banner links first.
pub fn parse_listing(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&BANNER)
        .chain(document.select(&CAROUSEL))
        .filter_map(|a| resolved_href(a, base))
        .collect()
}

#[instrument(level = "info", skip_all)]
pub async fn discover<F: Fetch>(fetcher: &F) -> Result<Discovery> {
    let base = base_url(LISTING_URL)?;
    let html = fetcher.get_text(LISTING_URL).await?;
    let urls = parse_listing(&html, &base);
    debug!(urls = ?urls, "Pague Menos flyer URLs");
    Ok(Discovery {
        links: urls.into_iter().map(FlyerLink::pdf).collect(),
        skipped: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listing_resolves_all_href_styles() {
        let html = r#"
            <section class="showcase-shelf-banner">
              <div class="text-center"><a href="/arquivos/jornal-semana.pdf">Baixar</a></div>
              <div class="text-center"><a>sem link</a></div>
            </section>
            <div class="owl-stage">
              <div class="item"><a href="//io.convertiez.com.br/m/paguemenos/encarte.pdf">1</a></div>
              <div class="item"><a href="https://www.superpaguemenos.com.br/hortifruti.pdf">2</a></div>
            </div>
            <div class="item"><a href="/fora-do-carrossel.pdf">ignored</a></div>
        "#;
        let base = Url::parse(LISTING_URL).unwrap();

        assert_eq!(
            parse_listing(html, &base),
            vec![
                "https://www.superpaguemenos.com.br/arquivos/jornal-semana.pdf",
                "https://io.convertiez.com.br/m/paguemenos/encarte.pdf",
                "https://www.superpaguemenos.com.br/hortifruti.pdf",
            ]
        );
    }

    #[test]
    fn test_parse_listing_without_flyers() {
        let base = Url::parse(LISTING_URL).unwrap();
        assert!(parse_listing("<html><body>manutenção</body></html>", &base).is_empty());
    }
}
