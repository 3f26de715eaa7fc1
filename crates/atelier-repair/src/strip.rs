//! Removal of conversational wrapping around generated source.
//!
//! Generators routinely wrap the actual source in markdown code fences or
//! lead-in prose ("Here is the component:"). Stripping must be idempotent:
//! source that is already clean passes through byte-identical.

use atelier_core::dialect::Dialect;
use once_cell::sync::Lazy;
use regex::Regex;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```").expect("fence regex is valid")
});

static CODE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(import\b|export\b|function\b|class\b|const\b|let\b|var\b|return\b|async\b|//|/\*|\{/\*|<[A-Za-z!/])")
        .expect("code-line regex is valid")
});

/// Strips conversational wrapping from generated source.
///
/// Order of preference: the longest fenced code block, then (plain markup)
/// the document slice between `<!DOCTYPE`/`<html` and `</html>`, then
/// (component markup) dropping lead-in prose before the first line that
/// looks like code. Input without any recognizable wrapping is returned
/// unchanged.
pub fn strip_wrapping(source: &str, dialect: Dialect) -> String {
    if let Some(block) = longest_fenced_block(source) {
        return block;
    }
    match dialect {
        Dialect::PlainMarkup => slice_to_document(source),
        Dialect::ComponentMarkup => drop_leading_prose(source),
    }
}

fn longest_fenced_block(source: &str) -> Option<String> {
    FENCED_BLOCK
        .captures_iter(source)
        .map(|caps| caps[1].to_string())
        .max_by_key(|block| block.len())
        .map(|block| block.trim_end().to_string() + "\n")
}

/// Cuts a plain-markup payload down to the document itself when prose
/// surrounds it. Documents already starting at the top pass through.
fn slice_to_document(source: &str) -> String {
    let lower = source.to_lowercase();
    let start = lower.find("<!doctype").or_else(|| lower.find("<html"));
    let Some(start) = start else {
        return source.to_string();
    };
    let end = lower
        .find("</html>")
        .map(|idx| idx + "</html>".len())
        .unwrap_or(source.len());
    if start == 0 || source[..start].trim().is_empty() {
        if end == source.len() || source[end..].trim().is_empty() {
            return source.to_string();
        }
        // Trailing prose after the document.
        return source[..end].to_string() + "\n";
    }
    source[start..end].to_string() + "\n"
}

/// Drops lead-in prose lines before the first code-looking line. Source
/// whose first non-blank line already looks like code is returned unchanged.
fn drop_leading_prose(source: &str) -> String {
    let first_non_blank = source
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("");
    if CODE_LINE.is_match(first_non_blank) {
        return source.to_string();
    }
    let mut offset = 0usize;
    for line in source.split_inclusive('\n') {
        if CODE_LINE.is_match(line) {
            return source[offset..].to_string();
        }
        offset += line.len();
    }
    source.to_string()
}
