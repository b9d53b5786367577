//! Analysis payload access
//!
//! Resolves the urgency level and display summary of an email from its
//! analysis payload, parses analyzer markdown into that payload, and
//! rewrites the urgency when the user overrides it.

mod edit;
mod keys;
mod markdown;
mod resolve;

pub use edit::set_urgency;
pub use keys::{SUMMARY_BLOCK, SUMMARY_SUBJECT, URGENCY_BLOCK, URGENCY_FIELD, VariantKey};
pub use markdown::parse_analysis_markdown;
pub use resolve::{resolve_summary, resolve_urgency};
