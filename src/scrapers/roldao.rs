//! Roldão Atacadista flyer scraper.
//!
//! The offers page lists blog posts; each post embeds a Real3D flipbook whose
//! configuration is a JavaScript string literal holding JSON:
//!
//! ```text
//! /* <![CDATA[ */
//! var real3d_flipbook_embed = "{\"pdfUrl\":\"https:\\/\\/roldao.com.br\\/...\\/encarte.pdf\"}";
//! /* ]]> */
//! ```
//!
//! The literal may additionally be HTML-entity-escaped and percent-encoded.
//! [`parse_flipbook_config`] undoes both, strips the JavaScript wrapping and
//! accepts only a config carrying an absolute http(s) `pdfUrl`.

use super::{Discovery, base_url, resolved_href};
use crate::error::{Error, Result};
use crate::fetch::Fetch;
use crate::models::FlyerLink;
use html_escape::decode_html_entities;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

pub const LISTING_URL: &str = "https://roldao.com.br/ofertas-do-roldao";

static OFFER_POST: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".post-item.category-ofertas").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static FLIPBOOK_SCRIPT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#real3d_flipbook_embed-js-extra").unwrap());
static ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)var\s+\w+\s*=\s*"(.*)"\s*;?\s*$"#).unwrap());

/// The only part of the flipbook configuration we rely on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FlipbookConfig {
    #[serde(rename = "pdfUrl")]
    pub pdf_url: String,
}

/// Post URLs on the offers page, first link of each post.
pub fn parse_listing(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut posts = Vec::new();
    for post in document.select(&OFFER_POST) {
        let Some(link) = post.select(&LINK).next() else {
            continue;
        };
        if let Some(url) = resolved_href(link, base) {
            if !posts.contains(&url) {
                posts.push(url);
            }
        }
    }
    posts
}

/// Raw text of the flipbook configuration script on a post page.
pub fn extract_flipbook_script(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    document
        .select(&FLIPBOOK_SCRIPT)
        .next()
        .map(|script| script.text().collect::<String>())
        .ok_or_else(|| Error::Parse("flipbook config script not found".into()))
}

/// Decode the flipbook configuration blob into a [`FlipbookConfig`].
pub fn parse_flipbook_config(script: &str) -> Result<FlipbookConfig> {
    let unescaped = decode_html_entities(script);
    let decoded = urlencoding::decode(&unescaped)
        .map_err(|e| Error::Parse(format!("flipbook config is not valid UTF-8 once decoded: {e}")))?;
    let body = decoded
        .replace("/* <![CDATA[ */", "")
        .replace("/* ]]> */", "");

    let literal = ASSIGNMENT
        .captures(body.trim())
        .and_then(|c| c.get(1))
        .ok_or_else(|| Error::Parse("flipbook config is not a quoted assignment".into()))?
        .as_str();
    let json = literal.replace('\\', "");

    let config: FlipbookConfig = serde_json::from_str(&json)
        .map_err(|e| Error::Parse(format!("flipbook config is not JSON with pdfUrl: {e}")))?;

    let url = Url::parse(config.pdf_url.trim())
        .map_err(|e| Error::Parse(format!("pdfUrl {:?} is not a URL: {e}", config.pdf_url)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Parse(format!("pdfUrl has unsupported scheme {}", url.scheme())));
    }
    Ok(FlipbookConfig {
        pdf_url: url.to_string(),
    })
}

async fn post_pdf_url<F: Fetch>(fetcher: &F, post_url: &str) -> Result<String> {
    let html = fetcher.get_text(post_url).await?;
    let script = extract_flipbook_script(&html)?;
    Ok(parse_flipbook_config(&script)?.pdf_url)
}

#[instrument(level = "info", skip_all)]
pub async fn discover<F: Fetch>(fetcher: &F) -> Result<Discovery> {
    let base = base_url(LISTING_URL)?;
    let html = fetcher.get_text(LISTING_URL).await?;
    let posts = parse_listing(&html, &base);
    debug!(posts = ?posts, "Roldão offer posts");

    let mut discovery = Discovery::default();
    for post in posts {
        match post_pdf_url(fetcher, &post).await {
            Ok(pdf_url) => discovery.links.push(FlyerLink::pdf(pdf_url)),
            Err(e) => {
                warn!(%post, error = %e, kind = e.kind(), "Skipping Roldão post");
                discovery.skipped.push(format!("{post}: {e}"));
            }
        }
    }
    Ok(discovery)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fetch::fake::FakeFetcher;

    pub(crate) const SCRIPT: &str = "/* <![CDATA[ */\nvar real3d_flipbook_embed = \"{\\\"pdfUrl\\\":\\\"https:\\\\/\\\\/roldao.com.br\\\\/wp-content\\\\/uploads\\\\/2025\\\\/10\\\\/Encarte%20Semanal.pdf\\\",\\\"lightboxText\\\":\\\"\\\"}\";\n/* ]]> */";

    pub(crate) fn post_html(script: &str) -> String {
        format!(
            r#"<html><head><script id="real3d_flipbook_embed-js-extra">{script}</script></head><body></body></html>"#
        )
    }

    #[test]
    fn test_parse_flipbook_config_extracts_pdf_url() {
        let config = parse_flipbook_config(SCRIPT).unwrap();
        assert_eq!(
            config.pdf_url,
            "https://roldao.com.br/wp-content/uploads/2025/10/Encarte%20Semanal.pdf"
        );
    }

    #[test]
    fn test_parse_flipbook_config_handles_html_entities() {
        let escaped = "var real3d_flipbook_embed = &quot;{\\&quot;pdfUrl\\&quot;:\\&quot;https:\\/\\/roldao.com.br\\/a.pdf\\&quot;}&quot;;";
        let config = parse_flipbook_config(escaped).unwrap();
        assert_eq!(config.pdf_url, "https://roldao.com.br/a.pdf");
    }

    #[test]
    fn test_parse_flipbook_config_rejects_unexpected_shapes() {
        for bad in [
            "",
            "console.log('no assignment');",
            r#"var x = "{\"title\":\"sem pdf\"}";"#,
            r#"var x = "{\"pdfUrl\":\"javascript:alert(1)\"}";"#,
            r#"var x = "{\"pdfUrl\":42}";"#,
        ] {
            let err = parse_flipbook_config(bad).unwrap_err();
            assert_eq!(err.kind(), "parse", "{bad}");
        }
    }

    #[test]
    fn test_extract_script_from_post_page() {
        let html = post_html(SCRIPT);
        assert_eq!(extract_flipbook_script(&html).unwrap(), SCRIPT);
        assert!(extract_flipbook_script("<html></html>").is_err());
    }

    #[test]
    fn test_parse_listing_takes_offer_posts_once() {
        let html = r#"
            <div class="post-item isotope-item post category-ofertas tag-roldao">
              <a href="https://roldao.com.br/ofertas-semana-42/"><img></a>
              <a href="https://roldao.com.br/category/ofertas/">Ofertas</a>
              <a href="https://roldao.com.br/author/admin/">admin</a>
              <a href="https://roldao.com.br/ofertas-semana-42/">Leia mais</a>
            </div>
            <div class="post-item category-ofertas">
              <a href="/ofertas-semana-43/">Semana 43</a>
              <a href="/tag/encarte/">encarte</a>
            </div>
            <div class="post-item category-ofertas"><span>sem link</span></div>
            <div class="post-item category-noticias"><a href="/noticia/">x</a></div>
        "#;
        let base = Url::parse(LISTING_URL).unwrap();
        assert_eq!(
            parse_listing(html, &base),
            vec![
                "https://roldao.com.br/ofertas-semana-42/",
                "https://roldao.com.br/ofertas-semana-43/",
            ]
        );
    }

    #[tokio::test]
    async fn test_discover_skips_broken_posts_and_keeps_going() {
        let listing = r#"
            <div class="post-item category-ofertas"><a href="/quebrado/">a</a></div>
            <div class="post-item category-ofertas"><a href="/sumiu/">b</a></div>
            <div class="post-item category-ofertas"><a href="/bom/">c</a></div>
        "#;
        let fetcher = FakeFetcher::default()
            .with(LISTING_URL, listing)
            .with("https://roldao.com.br/quebrado/", post_html("var x = 1;"))
            .with("https://roldao.com.br/bom/", post_html(SCRIPT));

        let found = discover(&fetcher).await.unwrap();

        assert_eq!(found.links.len(), 1);
        assert!(found.links[0].url.ends_with("Encarte%20Semanal.pdf"));
        assert_eq!(found.skipped.len(), 2);
    }
}
