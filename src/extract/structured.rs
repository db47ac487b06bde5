//! Selector-driven extraction for sources that declare a list selector

use crate::config::Selectors;
use crate::extract::text::{element_text, first_match, parse_price, parse_selector, resolve_link};
use crate::extract::CandidateItem;
use scraper::{Html, Selector};
use url::Url;

/// Per-container field selectors, parsed once per page
struct FieldSelectors {
    link: Selector,
    title: Selector,
    content: Option<Selector>,
    price: Option<Selector>,
}

impl FieldSelectors {
    /// Returns None if any configured selector fails to parse
    fn parse(selectors: &Selectors) -> Option<Self> {
        let anchor = parse_selector("a")?;
        let configured = |s: &Option<String>| -> Option<Option<Selector>> {
            match s.as_deref() {
                Some(s) => parse_selector(s).map(Some),
                None => Some(None),
            }
        };

        Some(Self {
            link: configured(&selectors.link)?.unwrap_or_else(|| anchor.clone()),
            title: configured(&selectors.title)?.unwrap_or(anchor),
            content: configured(&selectors.content)?,
            price: configured(&selectors.price)?,
        })
    }
}

/// Extracts one candidate per list container with a resolvable link
///
/// Field defaults when the matching selector is unset:
/// - link: first `<a>` in the container
/// - title: text of the first `<a>`
/// - content and price: absent
pub(crate) fn extract(
    document: &Html,
    base_url: &Url,
    list_selector: &str,
    selectors: &Selectors,
) -> Vec<CandidateItem> {
    let (Some(list), Some(fields)) = (
        parse_selector(list_selector),
        FieldSelectors::parse(selectors),
    ) else {
        tracing::warn!("Selectors for {} do not parse, extracting nothing", base_url);
        return Vec::new();
    };

    let mut items = Vec::new();

    for node in document.select(&list) {
        let Some(url) = first_match(node, &fields.link)
            .and_then(|link| link.value().attr("href"))
            .and_then(|href| resolve_link(href, base_url))
        else {
            continue;
        };

        let title = first_match(node, &fields.title).and_then(element_text);

        let body_text = fields
            .content
            .as_ref()
            .and_then(|selector| first_match(node, selector))
            .and_then(element_text);

        let price = fields
            .price
            .as_ref()
            .and_then(|selector| first_match(node, selector))
            .and_then(|element| parse_price(&element.text().collect::<String>()));

        items.push(CandidateItem {
            url,
            title,
            body_text,
            price,
        });
    }

    items
}
