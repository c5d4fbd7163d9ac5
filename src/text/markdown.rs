//! Markdown clean-up before chunking
//!
//! Converted PDFs come back as markdown full of tables and code listings that
//! make poor sentence units. Those lines are removed, blank-line runs are
//! collapsed to one, and the result is trimmed.

use regex::Regex;
use std::sync::OnceLock;

fn table_separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\|[-\s:]+\|").expect("valid table separator regex"))
}

/// Strip code fences, table rows and repeated blank lines from markdown
pub fn clean_markdown(markdown: &str) -> String {
    if markdown.is_empty() {
        return String::new();
    }

    let mut cleaned: Vec<&str> = Vec::new();
    let mut in_code_block = false;

    for line in markdown.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            continue;
        }

        if is_table_row(trimmed) {
            continue;
        }

        if trimmed.is_empty() && cleaned.last().is_some_and(|prev| prev.trim().is_empty()) {
            continue;
        }

        cleaned.push(line);
    }

    cleaned.join("\n").trim().to_string()
}

fn is_table_row(trimmed: &str) -> bool {
    (trimmed.starts_with('|') && trimmed.ends_with('|'))
        || table_separator_regex().is_match(trimmed)
}
