//! Tabular model of the model's CSV-like reply.
//!
//! Vision models are asked for CSV, but what comes back is only *CSV-like*:
//! ragged rows, stray blank lines, a quoted cell here and there. [`Table`]
//! turns that blob into rows of cells without ever rejecting input. A
//! malformed row is kept as it is and the renderers decide how to lay it out.
//!
//! Not an RFC 4180 parser. Quoting is honoured within a
//! single line only; a newline always ends a row.

use serde::{Deserialize, Serialize};

/// Cell delimiter requested from the model.
pub const DELIMITER: char = ',';

/// Rows of trimmed cells. The first row is the header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Parse a raw CSV blob.
    ///
    /// Blank lines are skipped so a trailing newline does not produce a
    /// phantom one-cell row.
    pub fn parse(raw: &str) -> Self {
        let normalised = raw.replace("\r\n", "\n").replace('\r', "\n");
        let rows = normalised
            .split('\n')
            .filter(|line| !line.trim().is_empty())
            .map(split_record)
            .collect();
        Self { rows }
    }

    /// Build a table directly from rows (first row is the header).
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    /// All rows, header included.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// The header row, if the table has any rows.
    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Every row after the header.
    pub fn body(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Widest row, in cells.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Number of rows, header included.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether any row has a different cell count than the header.
    pub fn is_ragged(&self) -> bool {
        let Some(header) = self.header() else {
            return false;
        };
        self.body().iter().any(|row| row.len() != header.len())
    }

    /// Re-serialise the cells as CSV, quoting cells that need it.
    pub fn to_csv(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| quote_cell(cell))
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Split one line into cells.
///
/// A cell is quoted when its first non-blank character is `"`. Inside a quoted
/// cell the delimiter is literal, `""` stands for one quote and whitespace is
/// kept as written; anything after the closing quote, up to the next
/// delimiter, is appended with trailing blanks trimmed. An unterminated quote
/// swallows the rest of the line. Unquoted cells are trimmed on both sides.
fn split_record(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace()) {
            chars.next();
        }

        let mut cell = String::new();
        let mut quoted = false;

        if chars.peek() == Some(&'"') {
            quoted = true;
            chars.next();
            while let Some(c) = chars.next() {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        cell.push('"');
                    } else {
                        break;
                    }
                } else {
                    cell.push(c);
                }
            }
        }

        let mut rest = String::new();
        let mut ended_by_delimiter = false;
        for c in chars.by_ref() {
            if c == DELIMITER {
                ended_by_delimiter = true;
                break;
            }
            rest.push(c);
        }

        if quoted {
            cell.push_str(rest.trim_end());
        } else {
            cell.push_str(rest.trim());
        }
        cells.push(cell);

        if !ended_by_delimiter {
            break;
        }
    }

    cells
}

fn quote_cell(cell: &str) -> String {
    if cell.contains([DELIMITER, '"', '\n']) || cell != cell.trim() {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(row: &[String]) -> Vec<&str> {
        row.iter().map(String::as_str).collect()
    }

    #[test]
    fn parses_simple_grid() {
        let t = Table::parse("Name, Age\nAlice, 30\nBob,25");
        assert_eq!(t.row_count(), 3);
        assert_eq!(cells(t.header().unwrap()), ["Name", "Age"]);
        assert_eq!(cells(&t.body()[1]), ["Bob", "25"]);
        assert!(!t.is_ragged());
    }

    #[test]
    fn skips_blank_lines_and_crlf() {
        let t = Table::parse("a,b\r\n\r\n1,2\r\n   \n");
        assert_eq!(t.row_count(), 2);
        assert_eq!(cells(&t.body()[0]), ["1", "2"]);
    }

    #[test]
    fn empty_input_is_empty_table() {
        let t = Table::parse("");
        assert!(t.is_empty());
        assert_eq!(t.width(), 0);
        assert!(t.header().is_none());
        assert!(t.body().is_empty());

        assert!(Table::parse("\n\n  \n").is_empty());
    }

    #[test]
    fn header_only_table_has_no_body() {
        let t = Table::parse("Item,Qty");
        assert_eq!(t.row_count(), 1);
        assert!(t.body().is_empty());
    }

    #[test]
    fn keeps_ragged_rows() {
        let t = Table::parse("a,b,c\n1\n1,2,3,4");
        assert_eq!(t.width(), 4);
        assert!(t.is_ragged());
        assert_eq!(cells(&t.body()[0]), ["1"]);
        assert_eq!(cells(&t.body()[1]), ["1", "2", "3", "4"]);
    }

    #[test]
    fn keeps_empty_cells() {
        let t = Table::parse("a,,c\n,,");
        assert_eq!(cells(t.header().unwrap()), ["a", "", "c"]);
        assert_eq!(cells(&t.body()[0]), ["", "", ""]);
    }

    #[test]
    fn quoted_cells_keep_commas() {
        let t = Table::parse("City,Population\n\"Paris, France\", 2100000");
        assert_eq!(cells(&t.body()[0]), ["Paris, France", "2100000"]);
    }

    #[test]
    fn escaped_quotes() {
        let t = Table::parse(r#""He said ""hi""",x"#);
        assert_eq!(cells(&t.rows()[0]), [r#"He said "hi""#, "x"]);
    }

    #[test]
    fn unterminated_quote_runs_to_end_of_line() {
        let t = Table::parse("\"open, never closed\nnext,row");
        assert_eq!(cells(&t.rows()[0]), ["open, never closed"]);
        assert_eq!(cells(&t.rows()[1]), ["next", "row"]);
    }

    #[test]
    fn text_after_closing_quote_is_appended() {
        let t = Table::parse("\"12\" inches,b");
        assert_eq!(cells(&t.rows()[0]), ["12 inches", "b"]);
    }

    #[test]
    fn quote_inside_unquoted_cell_is_literal() {
        let t = Table::parse("5\" pipe,2");
        assert_eq!(cells(&t.rows()[0]), ["5\" pipe", "2"]);
    }

    #[test]
    fn to_csv_quotes_where_needed() {
        let t = Table::from_rows(vec![
            vec!["a".into(), "b,c".into()],
            vec!["say \"x\"".into(), "".into()],
        ]);
        assert_eq!(t.to_csv(), "a,\"b,c\"\n\"say \"\"x\"\"\",");
        assert_eq!(Table::parse(&t.to_csv()), t);
    }

    #[test]
    fn quoted_cells_keep_inner_whitespace() {
        let t = Table::parse("\" a \",b\n\"x  \" ,\"  y\"");
        assert_eq!(cells(&t.rows()[0]), [" a ", "b"]);
        assert_eq!(cells(&t.rows()[1]), ["x  ", "  y"]);
    }

    #[test]
    fn padded_cells_survive_to_csv() {
        let t = Table::from_rows(vec![
            vec!["a ".into(), "b".into()],
            vec![" c".into(), " d ".into()],
        ]);
        assert_eq!(t.to_csv(), "\"a \",b\n\" c\",\" d \"");
        assert_eq!(Table::parse(&t.to_csv()), t);
    }
}
