//! Item extraction from listing pages
//!
//! This module turns a fetched listing page into candidate items:
//! - Structured mode when the source declares a list selector
//! - Heuristic mode over common listing containers otherwise
//! - Link resolution against the listing URL
//! - Price parsing from free text
//!
//! Extraction is a pure function of the page and the source's selectors.

mod heuristic;
mod structured;
mod text;

pub use heuristic::LISTING_CONTAINERS;
pub use text::{clean_text, parse_price, resolve_link};

use crate::config::Selectors;
use scraper::Html;
use std::collections::HashSet;
use url::Url;

/// An item observed on a listing page, not yet reconciled with the store
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateItem {
    /// Absolute URL; the item's identity within its source
    pub url: String,
    pub title: Option<String>,
    pub body_text: Option<String>,
    pub price: Option<f64>,
}

impl CandidateItem {
    /// Text the item's fingerprint is computed over
    ///
    /// Falls back from body text to title to URL, so every candidate has one.
    pub fn fingerprint_basis(&self) -> &str {
        self.body_text
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or(&self.url)
    }
}

/// Extracts candidate items from a listing page
///
/// Candidates come back in document order. When the same absolute URL is
/// found in several containers only the first occurrence is kept, so each
/// item is observed at most once per page.
///
/// # Example
///
/// ```
/// use driftwatch::config::Selectors;
/// use driftwatch::extract;
/// use url::Url;
///
/// let html = r#"<article><a href="/post/1">First</a><p>Teaser</p></article>"#;
/// let base_url = Url::parse("https://blog.example.com/").unwrap();
/// let items = extract(&Selectors::default(), &base_url, html);
/// assert_eq!(items[0].url, "https://blog.example.com/post/1");
/// assert_eq!(items[0].body_text.as_deref(), Some("Teaser"));
/// ```
pub fn extract(selectors: &Selectors, base_url: &Url, html: &str) -> Vec<CandidateItem> {
    let document = Html::parse_document(html);

    let candidates = match selectors.list.as_deref() {
        Some(list) => structured::extract(&document, base_url, list, selectors),
        None => heuristic::extract(&document, base_url),
    };

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.url.clone()))
        .collect()
}
