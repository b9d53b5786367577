//! Analyzer markdown -> analysis payload
//!
//! The analyzer answers with `### <section>` headings followed by bullet
//! entries of the form `- **field**: value`, where indented sub-bullets
//! belong to the entry above them.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{AnalysisEntry, AnalysisPayload};

static SECTION_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*###[ \t]*(.+?)[ \t]*$").expect("valid regex"));

static SUMMARY_VARIANT_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:##[ \t]*(?:邮件摘要|郵件摘要)|###[ \t]*意见摘要)[ \t]*$").expect("valid regex")
});

const SUMMARY_HEADING: &str = "### 邮件摘要";

/// Parse analyzer markdown into an analysis payload
///
/// Section keys are the heading text lower-cased with spaces replaced by
/// underscores. Each top-level bullet becomes one entry; its first line is
/// split on the first `:` and every continuation line holding a `:` adds
/// another field. Text before the first heading is ignored.
pub fn parse_analysis_markdown(markdown: &str) -> AnalysisPayload {
    let mut payload = AnalysisPayload::new();
    if markdown.trim().is_empty() {
        return payload;
    }

    let text = normalize(markdown);

    let headings: Vec<_> = SECTION_HEADING.captures_iter(&text).collect();
    for (i, caps) in headings.iter().enumerate() {
        let (Some(whole), Some(title)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = headings
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        let content = &text[whole.end()..end];

        let key = title.as_str().trim().to_lowercase().replace(' ', "_");
        payload.insert_section(key, parse_entries(content));
    }

    payload
}

fn normalize(markdown: &str) -> String {
    let mut text = markdown.trim();
    if let Some(rest) = text.strip_prefix("---") {
        text = rest.trim_start();
    }

    if text.contains(SUMMARY_HEADING) {
        text.to_string()
    } else {
        SUMMARY_VARIANT_HEADING
            .replace_all(text, SUMMARY_HEADING)
            .into_owned()
    }
}

fn parse_entries(content: &str) -> Vec<AnalysisEntry> {
    let mut raw: Vec<Vec<&str>> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if is_rule(trimmed) {
            continue;
        }
        if let Some(rest) = line.strip_prefix('-') {
            raw.push(vec![rest.trim_start()]);
        } else if let Some(current) = raw.last_mut() {
            current.push(line);
        } else if !trimmed.is_empty() {
            raw.push(vec![trimmed]);
        }
    }

    raw.into_iter()
        .filter(|lines| lines.iter().any(|l| !l.trim().is_empty()))
        .map(|lines| {
            let mut entry = AnalysisEntry::new();
            let (key, value) = split_field(lines[0]);
            entry.insert(key, value);
            for line in &lines[1..] {
                let line = line.trim();
                if line.contains(':') {
                    let (key, value) = split_field(line);
                    entry.insert(key, value);
                }
            }
            entry
        })
        .collect()
}

fn split_field(line: &str) -> (String, String) {
    match line.split_once(':') {
        Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
        None => (line.trim().to_string(), String::new()),
    }
}

fn is_rule(line: &str) -> bool {
    line.len() >= 3 && line.chars().all(|c| c == '-')
}
