//! CSV rendering

use super::ExportRow;
use std::borrow::Cow;

const HEADER: &str =
    "item_id,source_id,title,url,first_seen,last_seen,latest_version_hash,price_value";

/// Renders rows as CSV with a header line; absent values are empty fields
pub fn render_csv(rows: &[ExportRow]) -> String {
    let mut out = String::from(HEADER);
    out.push_str("\r\n");

    for row in rows {
        let fields = [
            row.item_id.to_string(),
            row.source_id.to_string(),
            escape(row.title.as_deref().unwrap_or_default()).into_owned(),
            escape(&row.url).into_owned(),
            row.first_seen.to_rfc3339(),
            row.last_seen.to_rfc3339(),
            row.latest_version_hash.clone().unwrap_or_default(),
            row.price_value.map(|p| p.to_string()).unwrap_or_default(),
        ];
        out.push_str(&fields.join(","));
        out.push_str("\r\n");
    }

    out
}

/// Quotes a field containing a comma, quote or line break
fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
