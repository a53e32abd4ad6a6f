//! Structured-document extraction: the lead image of an article page
//! and a whole-page text dump.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{auth::SessionManager, errors::Error, ports::Enricher, Result};

/// CMS field-image containers, tried first.
const FIELD_IMAGE_SELECTORS: &[&str] = &[
    "div.field-name-field-image img",
    "div.field-name-field-featured-image img",
    "div[class*='field-image'] img",
    "div[class*='field-featured-image'] img",
    "img[data-field-name*='image']",
    "img[data-field-name*='featured']",
];

/// Generic article-content containers, tried second.
const CONTENT_IMAGE_SELECTORS: &[&str] = &[
    "article img",
    "main img",
    ".node-content img",
    ".field-body img",
    ".content img",
];

/// Find the lead image of an article page.
///
/// Cascade: CMS field-image containers, then the first plausible image in
/// the article content (skipping icons, avatars and inline `data:` URLs),
/// then the `og:image` meta tag. Relative URLs are resolved against the
/// page URL.
pub fn lead_image(html: &str, page_url: &str) -> Option<String> {
    let doc = Html::parse_document(html);

    for &selector in FIELD_IMAGE_SELECTORS {
        let Some(img) = first_match(&doc, selector) else {
            continue;
        };
        if let Some(src) = img.value().attr("src").filter(|s| !s.is_empty()) {
            tracing::debug!(selector, src, "lead image found in field container");
            return Some(resolve_image_url(page_url, src));
        }
    }

    for &selector in CONTENT_IMAGE_SELECTORS {
        let Some(img) = first_match(&doc, selector) else {
            continue;
        };
        let class = img.value().attr("class").unwrap_or("").to_lowercase();
        if class.contains("icon") || class.contains("avatar") {
            continue;
        }
        let Some(src) = img.value().attr("src").filter(|s| !s.is_empty()) else {
            continue;
        };
        if src.starts_with("data:") {
            continue;
        }
        tracing::debug!(selector, src, "lead image found in article content");
        return Some(resolve_image_url(page_url, src));
    }

    if let Some(meta) = first_match(&doc, "meta[property='og:image']") {
        if let Some(content) = meta.value().attr("content").filter(|c| !c.is_empty()) {
            tracing::debug!(content, "lead image found in og:image meta tag");
            return Some(resolve_image_url(page_url, content));
        }
    }

    tracing::debug!(page_url, "no lead image found");
    None
}

/// Visible text of the whole document, for page dumps.
pub fn page_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    doc.root_element().text().collect::<String>()
}

fn first_match<'a>(doc: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel).next()
}

/// Absolute URLs pass through; relative ones resolve against the page;
/// anything unparseable is returned as-is.
fn resolve_image_url(page_url: &str, image_url: &str) -> String {
    if image_url.starts_with("http://") || image_url.starts_with("https://") {
        return image_url.to_string();
    }
    let Ok(base) = Url::parse(page_url) else {
        return image_url.to_string();
    };
    match base.join(image_url) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => image_url.to_string(),
    }
}

/// `Enricher` backed by an authenticated page fetch through the session
/// manager.
pub struct PageEnricher {
    session: Arc<SessionManager>,
}

impl PageEnricher {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Enricher for PageEnricher {
    async fn lead_image_for(&self, link: &str) -> Result<Option<String>> {
        if link.is_empty() {
            return Ok(None);
        }
        let resp = self.session.get_ok(link).await?;
        let html = resp.text().await.map_err(Error::Http)?;
        Ok(lead_image(&html, link))
    }
}
