//! Unfurl Resolver (§4.5): given a URL, fetch it and extract a four-field
//! link-preview tuple. Pure function of its input; never surfaces an error
//! to the caller — any fetch or parse failure degrades to the all-empty
//! tuple (spec.md §9 "Any-error-to-empty in the Unfurl path").

use scraper::{Html, Selector};
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Response bodies beyond this size are not parsed for metadata.
const MAX_UNFURL_BYTES: usize = 2 * 1024 * 1024;
const FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct UnfurlResult {
    pub title: String,
    pub description: String,
    pub image: String,
    pub favicon: String,
}

pub struct UnfurlResolver {
    client: reqwest::Client,
}

impl Default for UnfurlResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl UnfurlResolver {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .expect("failed to build unfurl HTTP client");
        Self { client }
    }

    /// Fetch `url` and extract Open Graph metadata, falling back to
    /// Twitter-card tags for the image. Always returns a full tuple; any
    /// failure along the way degrades silently to empty strings.
    pub async fn resolve(&self, url: &str) -> UnfurlResult {
        let Ok(base) = Url::parse(url) else {
            return UnfurlResult::default();
        };

        let Ok(response) = self.client.get(base.clone()).send().await else {
            return UnfurlResult::default();
        };
        if !response.status().is_success() {
            return UnfurlResult::default();
        }
        let Ok(body) = response.bytes().await else {
            return UnfurlResult::default();
        };
        let body = if body.len() > MAX_UNFURL_BYTES {
            &body[..MAX_UNFURL_BYTES]
        } else {
            &body[..]
        };
        let Ok(text) = std::str::from_utf8(body) else {
            return UnfurlResult::default();
        };

        extract(&base, text)
    }
}

fn extract(base: &Url, html: &str) -> UnfurlResult {
    let document = Html::parse_document(html);

    let title = meta_content(&document, &["meta[property='og:title']", "meta[name='twitter:title']"])
        .or_else(|| text_content(&document, "title"))
        .unwrap_or_default();

    let description = meta_content(
        &document,
        &["meta[property='og:description']", "meta[name='twitter:description']", "meta[name='description']"],
    )
    .unwrap_or_default();

    let image = meta_content(&document, &["meta[property='og:image']", "meta[name='twitter:image']"])
        .map(|src| resolve_url(base, &src))
        .unwrap_or_default();

    let favicon = meta_content(&document, &["link[rel='icon']", "link[rel='shortcut icon']"])
        .map(|href| resolve_url(base, &href))
        .unwrap_or_default();

    UnfurlResult {
        title,
        description,
        image,
        favicon,
    }
}

/// Tries each selector's `content` (or `href`) attribute in order, returning
/// the first non-empty match.
fn meta_content(document: &Html, selectors: &[&str]) -> Option<String> {
    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let attr = if raw.starts_with("link") { "href" } else { "content" };
            if let Some(value) = element.value().attr(attr) {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

fn text_content(document: &Html, raw_selector: &str) -> Option<String> {
    let selector = Selector::parse(raw_selector).ok()?;
    let text: String = document.select(&selector).next()?.text().collect();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href).map(|u| u.to_string()).unwrap_or_default()
}
