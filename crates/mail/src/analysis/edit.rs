//! Manual urgency override

use log::warn;
use regex::Regex;
use std::sync::LazyLock;

use super::keys::{URGENCY_BLOCK, URGENCY_FIELD};
use crate::models::{AnalysisEntry, AnalysisPayload, Urgency};

static URGENCY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-[ \t]*\*\*(?:紧急|緊急)程度\*\*:[ \t]*)(.*)").expect("valid regex")
});

/// Record a new urgency level in both the payload and the markdown
///
/// The payload is updated where an urgency field already exists (either
/// spelling, at either level); otherwise the simplified section, entry and
/// field are created. Every urgency line of the markdown is rewritten, or a
/// new urgency section is appended when there is none. Returns the new
/// markdown.
pub fn set_urgency(payload: &mut AnalysisPayload, markdown: &str, level: Urgency) -> String {
    if !update_existing_field(payload, level) {
        warn!("No urgency field in analysis payload, creating one");
        let entries = payload.section_or_default(URGENCY_BLOCK.simplified);
        if entries.is_empty() {
            entries.push(AnalysisEntry::new());
        }
        entries[0].insert(URGENCY_FIELD.simplified.to_string(), level.as_str().to_string());
    }

    if URGENCY_LINE.is_match(markdown) {
        URGENCY_LINE
            .replace_all(markdown, |caps: &regex::Captures| format!("{}{}", &caps[1], level.as_str()))
            .into_owned()
    } else {
        warn!("No urgency line in analysis markdown, appending a section");
        format!(
            "{}\n\n### {}\n\n- **紧急程度**: {}\n",
            markdown.trim(),
            URGENCY_BLOCK.simplified,
            level.as_str()
        )
    }
}

fn update_existing_field(payload: &mut AnalysisPayload, level: Urgency) -> bool {
    for block in URGENCY_BLOCK.candidates() {
        let Some(first) = payload.section_mut(block).and_then(|entries| entries.first_mut()) else {
            continue;
        };
        if let Some(field) = URGENCY_FIELD
            .candidates()
            .into_iter()
            .find(|field| first.contains_key(*field))
        {
            first.insert(field.to_string(), level.as_str().to_string());
            return true;
        }
    }
    false
}
