//! Case-insensitive match highlighting

use log::warn;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// A highlighted text span within a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSpan {
    /// Start byte offset
    pub start: usize,
    /// End byte offset
    pub end: usize,
}

fn term_regex(term: &str) -> Option<Regex> {
    if term.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .map_err(|e| warn!("Cannot highlight {term:?}: {e}"))
        .ok()
}

/// Byte ranges of every non-overlapping match of `term` in `text`
pub fn highlight_spans(text: &str, term: &str) -> Vec<HighlightSpan> {
    let Some(re) = term_regex(term) else {
        return Vec::new();
    };
    re.find_iter(text)
        .map(|m| HighlightSpan {
            start: m.start(),
            end: m.end(),
        })
        .collect()
}

/// Wrap every match of `term` in `open`/`close`, keeping the matched casing
pub fn mark(text: &str, term: &str, open: &str, close: &str) -> String {
    let spans = highlight_spans(text, term);
    if spans.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len() + spans.len() * (open.len() + close.len()));
    let mut cursor = 0;
    for span in spans {
        out.push_str(&text[cursor..span.start]);
        out.push_str(open);
        out.push_str(&text[span.start..span.end]);
        out.push_str(close);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_are_case_insensitive() {
        let spans = highlight_spans("Invoice and INVOICE and invoice", "invoice");
        assert_eq!(
            spans,
            vec![
                HighlightSpan { start: 0, end: 7 },
                HighlightSpan { start: 12, end: 19 },
                HighlightSpan { start: 24, end: 31 },
            ]
        );
    }

    #[test]
    fn test_metacharacters_are_literal() {
        assert_eq!(highlight_spans("cost (USD) $5.00", "(usd)").len(), 1);
        assert_eq!(highlight_spans("a.b axb", "a.b"), vec![HighlightSpan { start: 0, end: 3 }]);
    }

    #[test]
    fn test_mark() {
        assert_eq!(mark("会议通知: 明天会议", "会议", "<mark>", "</mark>"), "<mark>会议</mark>通知: 明天<mark>会议</mark>");
        assert_eq!(mark("Hello World", "world", "[", "]"), "Hello [World]");
        assert_eq!(mark("nothing here", "zzz", "[", "]"), "nothing here");
        assert_eq!(mark("text", "", "[", "]"), "text");
    }
}
