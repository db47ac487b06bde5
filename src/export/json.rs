//! JSON rendering

use super::ExportRow;

/// Renders rows as a pretty-printed JSON array; absent values are `null`
pub fn render_json(rows: &[ExportRow]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(rows)
}
