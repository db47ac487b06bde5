//! Markdown rendering
//!
//! Produces a single table of the source's items, newest observations
//! included, suitable for pasting into a report.

use super::ExportRow;

/// Formats the rows as a markdown document with one table
pub fn render_markdown(source_id: i64, rows: &[ExportRow]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Items for source {}\n\n", source_id));
    md.push_str(&format!("- **Items**: {}\n\n", rows.len()));

    if rows.is_empty() {
        md.push_str("_No items tracked yet._\n");
        return md;
    }

    md.push_str("| ID | Title | URL | First seen | Last seen | Fingerprint | Price |\n");
    md.push_str("|----|-------|-----|------------|-----------|-------------|-------|\n");

    for row in rows {
        let url = escape_cell(&row.url);
        md.push_str(&format!(
            "| {} | {} | [{}]({}) | {} | {} | {} | {} |\n",
            row.item_id,
            escape_cell(row.title.as_deref().unwrap_or_default()),
            url,
            url,
            row.first_seen.format("%Y-%m-%d %H:%M:%S"),
            row.last_seen.format("%Y-%m-%d %H:%M:%S"),
            row.latest_version_hash
                .as_deref()
                .map(short_hash)
                .unwrap_or_default(),
            row.price_value.map(|p| p.to_string()).unwrap_or_default(),
        ));
    }

    md
}

/// Escapes pipes and flattens line breaks so the cell stays in its column
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
