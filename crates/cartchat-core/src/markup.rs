//! Text markup conventions the agent uses instead of JSON.
//!
//! Two conventions are recognized in plain narrative text:
//!
//! ```text
//! heading: "Top Picks"
//! ["item one"]
//! ["item two"]
//! ```
//!
//! and a pipe-separated comparison table:
//!
//! ```text
//! #Categories: *A* | *B*
//! #Use Case: val1 | val2
//! ```

use std::sync::OnceLock;

use cartchat_types::TableData;
use regex::Regex;

const TABLE_MARKER: &str = "#Categories:";
const HEADING_MARKER: &str = "heading:";

/// A heading with its bullet items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingList {
    pub heading: String,
    pub items: Vec<String>,
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"heading:\s*"([^"]+)""#).expect("heading regex is valid"))
}

fn list_item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\[\s*"([^"]+)"\s*\]"#).expect("list item regex is valid"))
}

/// True when the text uses the `#Categories:` table convention.
pub fn contains_table_markup(text: &str) -> bool {
    text.contains(TABLE_MARKER)
}

/// True when the text uses the `heading:` list convention.
pub fn contains_heading_markup(text: &str) -> bool {
    text.contains(HEADING_MARKER)
}

/// Parses `#Categories:` markup into a table.
///
/// Returns `None` unless the markup yields at least one header and one row.
pub fn parse_table(text: &str) -> Option<TableData> {
    if !contains_table_markup(text) {
        return None;
    }

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let header_idx = lines.iter().position(|line| line.starts_with(TABLE_MARKER))?;

    // Empty header cells are kept, matching how row values are split
    let mut headers = vec![String::new()];
    let header_cells = &lines[header_idx][TABLE_MARKER.len()..];
    if !header_cells.trim().is_empty() {
        headers.extend(split_cells(header_cells));
    }

    let rows: Vec<Vec<String>> = lines[header_idx + 1..]
        .iter()
        .filter(|line| line.starts_with('#') && !line.starts_with(TABLE_MARKER))
        .filter_map(|line| {
            let (label, values) = line[1..].split_once(':')?;
            let mut row = vec![strip_markers(label)];
            row.extend(split_cells(values));
            Some(row)
        })
        .collect();

    let table = TableData { headers, rows };
    // The leading empty header belongs to the row-label column
    (table.headers.len() > 1 && !table.rows.is_empty()).then_some(table)
}

/// Parses `heading:` markup into a heading plus deduplicated list items.
///
/// Returns `None` unless both a heading and at least one item are present.
pub fn parse_heading_list(text: &str) -> Option<HeadingList> {
    if !contains_heading_markup(text) {
        return None;
    }

    let heading = heading_re().captures(text)?.get(1)?.as_str().to_string();

    let mut items: Vec<String> = Vec::new();
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if let Some(item) = list_item_re().captures(line).and_then(|c| c.get(1)) {
            let item = item.as_str();
            if !items.iter().any(|existing| existing == item) {
                items.push(item.to_string());
            }
        }
    }

    if items.is_empty() {
        return None;
    }
    Some(HeadingList { heading, items })
}

fn split_cells(raw: &str) -> Vec<String> {
    raw.split('|').map(strip_markers).collect()
}

fn strip_markers(cell: &str) -> String {
    cell.trim().trim_matches('*').trim().to_string()
}
