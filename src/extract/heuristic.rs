//! Fallback extraction for sources without a list selector
//!
//! Blog and news listings usually wrap each entry in one of a handful of
//! container shapes; each container's first link is taken as the entry.

use crate::extract::text::{element_text, first_match, parse_selector, resolve_link};
use crate::extract::CandidateItem;
use scraper::Html;
use url::Url;

/// Container patterns tried when a source has no list selector
pub const LISTING_CONTAINERS: &str = "article, li, .post, .entry, .news-item";

pub(crate) fn extract(document: &Html, base_url: &Url) -> Vec<CandidateItem> {
    let (Some(containers), Some(anchor), Some(paragraph)) = (
        parse_selector(LISTING_CONTAINERS),
        parse_selector("a"),
        parse_selector("p"),
    ) else {
        return Vec::new();
    };

    let mut items = Vec::new();

    for node in document.select(&containers) {
        let Some(link) = first_match(node, &anchor) else {
            continue;
        };
        let Some(url) = link
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        else {
            continue;
        };

        items.push(CandidateItem {
            url,
            title: element_text(link),
            body_text: first_match(node, &paragraph).and_then(element_text),
            price: None,
        });
    }

    items
}
