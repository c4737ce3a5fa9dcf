//! Post-processing: deterministic cleanup of the model's CSV reply.
//!
//! The prompt asks for bare CSV, but models still wrap replies in
//! ` ```csv ` fences, emit CRLF line endings, or leak zero-width characters
//! copied from the image text layer. These rules turn the reply into the
//! raw CSV blob the table parser and the CSV view work from.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so a fence line
//! ending in `\r` is still recognised; blank-line trimming runs last so it
//! sees the text with fences and invisible characters already gone.

use crate::prompts::NO_TABLE_SENTINEL;
use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all clean-up rules to a raw model reply.
///
/// Rules (applied in order):
/// 1. Strip markdown fences (```` ```csv ````, ```` ``` ````, any language tag)
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Strip invisible Unicode (BOM, zero-width spaces, soft hyphens)
/// 4. Trim trailing whitespace per line
/// 5. Trim leading whitespace and trailing blank lines
pub fn clean_reply(input: &str) -> String {
    let s = strip_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    trim_blank_edges(&s)
}

/// Whether a cleaned reply means "no table in this image".
///
/// True for the sentinel the prompt asks for (case-insensitive) and for an
/// empty reply.
pub fn is_no_table(cleaned: &str) -> bool {
    let trimmed = cleaned.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NO_TABLE_SENTINEL)
}

// ── Rule 1: Strip markdown fences ────────────────────────────────────────────

/// A whole line that is only a fence, with an optional language tag.
static RE_FENCE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*```[A-Za-z0-9_+-]*[ \t]*\r?$\n?").unwrap());

/// Any fence marker left inline, e.g. `` ```csv a,b``` ``.
static RE_FENCE_INLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```(?:csv|CSV)?").unwrap());

fn strip_fences(input: &str) -> String {
    let s = RE_FENCE_LINE.replace_all(input, "");
    RE_FENCE_INLINE.replace_all(&s, "").to_string()
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Trim leading whitespace and trailing blank lines ─────────────────

fn trim_blank_edges(input: &str) -> String {
    input.trim_start().trim_end_matches('\n').to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_csv_fence() {
        let input = "```csv\nA,B\n1,2\n```";
        assert_eq!(clean_reply(input), "A,B\n1,2");
    }

    #[test]
    fn test_strip_plain_fence() {
        let input = "```\nA,B\n1,2\n```\n";
        assert_eq!(clean_reply(input), "A,B\n1,2");
    }

    #[test]
    fn test_strip_other_language_tag() {
        let input = "```text\nA,B\n```";
        assert_eq!(clean_reply(input), "A,B");
    }

    #[test]
    fn test_strip_inline_fences() {
        assert_eq!(clean_reply("```csv A,B```"), "A,B");
    }

    #[test]
    fn test_fence_with_crlf() {
        let input = "```csv\r\nA,B\r\n1,2\r\n```\r\n";
        assert_eq!(clean_reply(input), "A,B\n1,2");
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(clean_reply("A,B\n1,2"), "A,B\n1,2");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(remove_invisible_chars("\u{FEFF}A,\u{200B}B"), "A,B");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("a,b   \n1,2\t"), "a,b\n1,2");
    }

    #[test]
    fn test_trim_blank_edges_keeps_inner_blank_lines() {
        assert_eq!(clean_reply("\n\nA\n\nB\n\n"), "A\n\nB");
    }

    #[test]
    fn test_leading_whitespace_removed() {
        assert_eq!(clean_reply("  \n\t  Item,Qty\n  Pen, 2"), "Item,Qty\n  Pen, 2");
        assert_eq!(clean_reply("   ```csv\n A,B\n```"), "A,B");
    }

    #[test]
    fn test_is_no_table() {
        assert!(is_no_table("ERROR"));
        assert!(is_no_table("error"));
        assert!(is_no_table(&clean_reply("```\nERROR\n```")));
        assert!(is_no_table(""));
        assert!(is_no_table("  \n "));
        assert!(!is_no_table("ERROR,CODE\nE1,bad"));
    }
}
