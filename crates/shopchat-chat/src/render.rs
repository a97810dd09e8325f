//! Text rendering for answer prose.
//!
//! Turns raw answer text into paragraph blocks with inline emphasis spans.
//! Only two constructs are recognised: blank-line paragraph breaks and
//! `**bold**` runs. Everything else passes through as plain text.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

/// Two or more consecutive line breaks separate paragraphs.
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\r?\n){2,}").expect("Invalid paragraph regex"));

const EMPHASIS_DELIMITER: &str = "**";

// =============================================================================
// Blocks
// =============================================================================

/// A run of text inside a paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    pub text: String,
    pub emphasized: bool,
}

impl Span {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasized: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            emphasized: true,
        }
    }
}

/// One paragraph of rendered text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParagraphBlock {
    /// Display hint: set on every paragraph after the first.
    pub spaced: bool,
    pub spans: Vec<Span>,
}

impl ParagraphBlock {
    /// The paragraph's text with emphasis markers stripped.
    pub fn plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

// =============================================================================
// Rendering
// =============================================================================

/// Render answer text into paragraph blocks.
///
/// Empty input yields no blocks. Never fails.
pub fn render(raw: &str) -> Vec<ParagraphBlock> {
    if raw.is_empty() {
        return Vec::new();
    }

    PARAGRAPH_BREAK
        .split(raw)
        .enumerate()
        .map(|(index, paragraph)| ParagraphBlock {
            spaced: index > 0,
            spans: emphasis_spans(paragraph),
        })
        .collect()
}

/// Render a loosely-typed value, coercing it to text first.
pub fn render_value(raw: &Value) -> Vec<ParagraphBlock> {
    render(&coerce_text(raw))
}

/// Coerce an arbitrary JSON value into displayable text.
///
/// Strings pass through, null becomes empty, arrays are joined with a single
/// space, and anything else uses its JSON spelling.
pub fn coerce_text(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(coerce_element)
            .collect::<Vec<_>>()
            .join(" "),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn coerce_element(item: &Value) -> String {
    match item {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Split a paragraph on `**` and alternate plain/emphasized, starting plain.
///
/// Empty parts are dropped. An unbalanced delimiter is not repaired: the
/// trailing part keeps whatever parity its position gives it.
fn emphasis_spans(paragraph: &str) -> Vec<Span> {
    paragraph
        .split(EMPHASIS_DELIMITER)
        .enumerate()
        .filter(|(_, part)| !part.is_empty())
        .map(|(index, part)| Span {
            text: part.to_string(),
            emphasized: index % 2 == 1,
        })
        .collect()
}
