//! Keyword-guided excerpt selection for oversized CI logs.
//!
//! Lines containing a failure keyword are kept together with a window of
//! surrounding context. When the selection is thin, the tail of the log is
//! appended behind [`TAIL_MARKER`]. The result is capped by keeping the last
//! `max_chars` characters, since build tools tend to print the fatal error last.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_CHARS: usize = 10_000;
pub const DEFAULT_CONTEXT_LINES: usize = 10;
/// Tail length multiplier applied to `context_lines` on the fallback path.
pub const TAIL_LINES_PER_CONTEXT_LINE: usize = 10;
pub const TAIL_MARKER: &str = "\n\n[...Tail of log...]\n\n";
pub const DEFAULT_FAILURE_KEYWORDS: &[&str] = &[
    "error",
    "exception",
    "fail",
    "traceback",
    "fatal",
    "segfault",
    "undefined",
    "not found",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextExtractorConfig {
    pub max_chars: usize,
    pub context_lines: usize,
    /// Matched case-insensitively as substrings.
    pub keywords: Vec<String>,
}

impl Default for ContextExtractorConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            context_lines: DEFAULT_CONTEXT_LINES,
            keywords: DEFAULT_FAILURE_KEYWORDS
                .iter()
                .map(|keyword| keyword.to_string())
                .collect(),
        }
    }
}

impl ContextExtractorConfig {
    pub fn with_budget(max_chars: usize, context_lines: usize) -> Self {
        Self {
            max_chars,
            context_lines,
            ..Self::default()
        }
    }

    pub fn extract(&self, log_text: &str) -> String {
        let lines = split_log_lines(log_text);
        if lines.is_empty() {
            return String::new();
        }

        let keywords = self
            .keywords
            .iter()
            .map(|keyword| keyword.to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect::<Vec<_>>();
        let selected = select_context_lines(&lines, &keywords, self.context_lines);

        let mut excerpt = selected
            .iter()
            .map(|index| lines[*index])
            .collect::<Vec<_>>()
            .join("\n");

        if excerpt.chars().count() < self.max_chars / 2 {
            let tail_len = self
                .context_lines
                .saturating_mul(TAIL_LINES_PER_CONTEXT_LINE);
            let tail_start = lines.len().saturating_sub(tail_len);
            excerpt.push_str(TAIL_MARKER);
            excerpt.push_str(&lines[tail_start..].join("\n"));
        }

        keep_char_suffix(&excerpt, self.max_chars).to_string()
    }
}

/// Extracts a bounded excerpt with the default keyword set.
pub fn extract_failure_context(log_text: &str, max_chars: usize, context_lines: usize) -> String {
    ContextExtractorConfig::with_budget(max_chars, context_lines).extract(log_text)
}

/// Ascending, deduplicated indices of every line within `context_lines` of a
/// keyword hit. Overlapping windows merge naturally through the mask.
pub fn select_context_lines(
    lines: &[&str],
    keywords: &[String],
    context_lines: usize,
) -> Vec<usize> {
    let mut keep = vec![false; lines.len()];
    for (index, line) in lines.iter().enumerate() {
        let lowered = line.to_lowercase();
        if !keywords
            .iter()
            .any(|keyword| lowered.contains(keyword.as_str()))
        {
            continue;
        }
        let start = index.saturating_sub(context_lines);
        let end = index
            .saturating_add(context_lines)
            .saturating_add(1)
            .min(lines.len());
        keep[start..end].iter_mut().for_each(|slot| *slot = true);
    }

    keep.iter()
        .enumerate()
        .filter_map(|(index, keep)| keep.then_some(index))
        .collect()
}

/// Splits on every line boundary a runner log can carry, `\r\n` counting once.
///
/// A bare `\r` ends a line too, so progress bars that redraw in place become
/// separate lines instead of one huge line. A trailing terminator does not
/// produce an empty last line.
pub fn split_log_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((index, ch)) = chars.next() {
        if !is_line_break(ch) {
            continue;
        }
        lines.push(&text[start..index]);
        start = index + ch.len_utf8();
        if ch == '\r' {
            if let Some((next_index, '\n')) = chars.peek().copied() {
                chars.next();
                start = next_index + 1;
            }
        }
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

fn is_line_break(ch: char) -> bool {
    matches!(
        ch,
        '\n' | '\r'
            | '\u{0b}'
            | '\u{0c}'
            | '\u{1c}'
            | '\u{1d}'
            | '\u{1e}'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// Last `max_chars` characters of `text`, on a char boundary.
pub fn keep_char_suffix(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    match text.char_indices().rev().nth(max_chars - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}
