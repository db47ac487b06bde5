//! Field-level helpers shared by both extraction strategies

use scraper::{ElementRef, Selector};
use url::Url;

/// Parses a CSS selector, treating an unparsable one as matching nothing
pub(crate) fn parse_selector(selector: &str) -> Option<Selector> {
    match Selector::parse(selector) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::debug!("Ignoring unparsable selector '{}': {:?}", selector, e);
            None
        }
    }
}

/// Returns the first descendant of `node` matching `selector`
pub(crate) fn first_match<'a>(node: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    node.select(selector).next()
}

/// Collects an element's text, trimmed; empty text becomes `None`
pub(crate) fn element_text(element: ElementRef<'_>) -> Option<String> {
    clean_text(&element.text().collect::<String>())
}

/// Trims whitespace and normalises the empty string to `None`
pub fn clean_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parses a price from free text
///
/// Every character other than an ASCII digit or `.` is dropped before
/// parsing, so `"$1,234.56"` reads as `1234.56`. Text that leaves nothing
/// parsable (`"Free"`, `"1.2.3"`) has no price.
pub fn parse_price(text: &str) -> Option<f64> {
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    match digits.parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::debug!("No price in '{}'", text.trim());
            None
        }
    }
}

/// Resolves an `href` against the listing page URL
///
/// Returns None if the link should be excluded:
/// - empty and fragment-only hrefs
/// - javascript:, mailto:, tel: and data: schemes
/// - hrefs that do not resolve to an http(s) URL
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
