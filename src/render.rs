//! Views derived from a [`Table`]: HTML, JSON records and GFM Markdown.
//!
//! Each renderer is a pure `&Table → String` function. Cell text comes from a
//! model reply and is treated as untrusted: HTML output escapes it and
//! Markdown output escapes pipes so a stray `|` cannot shift columns.

use crate::error::Img2TableError;
use crate::table::Table;
use serde_json::{Map, Value};

// ── HTML ─────────────────────────────────────────────────────────────────────

/// Render the table as an HTML `<table>`; header cells use `<th>`.
pub fn to_html(table: &Table) -> String {
    if table.is_empty() {
        return "<table></table>".to_string();
    }

    let mut html = String::from("<table>\n");
    for (i, row) in table.rows().iter().enumerate() {
        let tag = if i == 0 { "th" } else { "td" };
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<{tag}>{}</{tag}>", escape_html(cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>");
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ── JSON ─────────────────────────────────────────────────────────────────────

/// One JSON object per body row, keyed by the header cells.
///
/// Short rows omit the keys they have no cell for; cells beyond the header
/// width have no key and are dropped. A repeated header name keeps its first
/// position and takes the value of its last column.
pub fn to_json_records(table: &Table) -> Vec<Map<String, Value>> {
    let Some(header) = table.header() else {
        return Vec::new();
    };

    table
        .body()
        .iter()
        .map(|row| {
            let mut record = Map::new();
            for (key, cell) in header.iter().zip(row.iter()) {
                record.insert(key.clone(), Value::String(cell.clone()));
            }
            record
        })
        .collect()
}

/// Records pretty-printed with two-space indentation.
pub fn to_json(table: &Table) -> Result<String, Img2TableError> {
    Ok(serde_json::to_string_pretty(&to_json_records(table))?)
}

// ── Markdown ─────────────────────────────────────────────────────────────────

/// Render the table as a GFM pipe table.
///
/// Every row, header included, is padded with empty cells to the table
/// width so renderers never drop trailing cells. An empty table renders as
/// the empty string.
pub fn to_markdown(table: &Table) -> String {
    let Some(header) = table.header() else {
        return String::new();
    };
    let width = table.width();

    let mut lines = Vec::with_capacity(table.row_count() + 1);
    lines.push(markdown_row(header, width));
    lines.push(format!("| {} |", vec!["---"; width].join(" | ")));
    for row in table.body() {
        lines.push(markdown_row(row, width));
    }
    lines.join("\n")
}

fn markdown_row(row: &[String], width: usize) -> String {
    let cells: Vec<String> = (0..width)
        .map(|i| row.get(i).map(|c| escape_markdown_cell(c)).unwrap_or_default())
        .collect();
    format!("| {} |", cells.join(" | "))
}

fn escape_markdown_cell(cell: &str) -> String {
    cell.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_uses_th_for_header() {
        let t = Table::parse("A,B\n1,2");
        assert_eq!(
            to_html(&t),
            "<table>\n<tr><th>A</th><th>B</th></tr>\n<tr><td>1</td><td>2</td></tr>\n</table>"
        );
    }

    #[test]
    fn html_escapes_cells() {
        let t = Table::parse("<script>alert(1)</script>,a&b");
        let html = to_html(&t);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("a&amp;b"));
    }

    #[test]
    fn html_empty_table() {
        assert_eq!(to_html(&Table::default()), "<table></table>");
    }

    #[test]
    fn json_records_keyed_by_header() {
        let t = Table::parse("name,age\nAlice,30\nBob,25");
        let records = to_json_records(&t);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], "Alice");
        assert_eq!(records[1]["age"], "25");
    }

    #[test]
    fn json_keeps_column_order() {
        let t = Table::parse("zeta,alpha\n1,2");
        let records = to_json_records(&t);
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, ["zeta", "alpha"]);
    }

    #[test]
    fn json_short_row_omits_keys_and_long_row_drops_extras() {
        let t = Table::parse("a,b,c\n1\n1,2,3,4");
        let records = to_json_records(&t);
        assert_eq!(records[0].len(), 1);
        assert!(!records[0].contains_key("b"));
        assert_eq!(records[1].len(), 3);
        assert_eq!(records[1]["c"], "3");
    }

    #[test]
    fn json_duplicate_header_takes_last_value() {
        let t = Table::parse("x,y,x\n1,2,3");
        let records = to_json_records(&t);
        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, ["x", "y"]);
        assert_eq!(records[0]["x"], "3");
    }

    #[test]
    fn json_empty_and_header_only() {
        assert_eq!(to_json(&Table::default()).unwrap(), "[]");
        assert_eq!(to_json(&Table::parse("a,b")).unwrap(), "[]");
    }

    #[test]
    fn json_pretty_two_space_indent() {
        let json = to_json(&Table::parse("k\nv")).unwrap();
        assert_eq!(json, "[\n  {\n    \"k\": \"v\"\n  }\n]");
    }

    #[test]
    fn markdown_basic() {
        let t = Table::parse("A,B\n1,2");
        assert_eq!(to_markdown(&t), "| A | B |\n| --- | --- |\n| 1 | 2 |");
    }

    #[test]
    fn markdown_pads_ragged_rows() {
        let t = Table::parse("A,B\n1\n1,2,3");
        assert_eq!(
            to_markdown(&t),
            "| A | B |  |\n| --- | --- | --- |\n| 1 |  |  |\n| 1 | 2 | 3 |"
        );
    }

    #[test]
    fn markdown_escapes_pipes() {
        let t = Table::parse("A\na|b");
        assert!(to_markdown(&t).ends_with("| a\\|b |"));
    }

    #[test]
    fn markdown_empty_and_header_only() {
        assert_eq!(to_markdown(&Table::default()), "");
        assert_eq!(to_markdown(&Table::parse("A,B")), "| A | B |\n| --- | --- |");
    }
}
