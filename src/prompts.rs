//! Instruction prompt for VLM-based table extraction.
//!
//! Callers can override the default via
//! [`crate::config::ExtractionConfig::prompt`]; the constants here are used
//! only when no override is provided.

/// Reply the model is told to give when the image holds no table.
pub const NO_TABLE_SENTINEL: &str = "ERROR";

/// Default instruction sent alongside the image.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"Task: Extract data from this image into clean CSV format.
Rules:
1. Output ONLY the CSV data. No markdown, no explanations.
2. Use comma (,) delimiter.
3. Handle merged cells by duplicating values.
4. If no table found, return "ERROR"."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_the_sentinel() {
        assert!(DEFAULT_EXTRACTION_PROMPT.contains(&format!("\"{NO_TABLE_SENTINEL}\"")));
    }

    #[test]
    fn prompt_requests_comma_delimiter() {
        assert!(DEFAULT_EXTRACTION_PROMPT.contains(crate::table::DELIMITER));
    }
}
