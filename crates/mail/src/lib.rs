//! Mail crate - organization and live-sync engine for an analyzed mailbox
//!
//! This crate provides platform-independent functionality including:
//! - Domain models (Email, EmailAddress, Urgency, analysis payload)
//! - Field resolution over variant-keyed analysis payloads
//! - Filtering, calendar grouping and within-day ordering
//! - Debounced, scoped search with stale-result protection
//! - Streaming sync sessions
//! - Backend collaborators (HTTP and in-memory)
//!
//! This crate has zero UI dependencies.

pub mod analysis;
pub mod backend;
pub mod config;
pub mod inbox;
pub mod models;
pub mod query;
pub mod search;
pub mod sync;

pub use analysis::{parse_analysis_markdown, resolve_summary, resolve_urgency, set_urgency};
pub use backend::{BackendError, HttpBackend, InMemoryBackend, MailBackend, Mailboxes, Settings, SyncLines, SyncStream};
pub use config::ClientConfig;
pub use inbox::Inbox;
pub use models::{AnalysisPayload, Email, EmailAddress, EmailBuilder, EmailId, StatusUpdate, Urgency};
pub use query::{
    DayBucket, FilterCriteria, GroupTree, ReadFilter, StarredFilter, UrgencyFilter, filter_emails, group_emails,
    sort_within_day,
};
pub use search::{
    HighlightSpan, ParsedSearch, SearchController, SearchScope, SearchState, highlight_spans, highlight_term,
    parse_search, suggestions,
};
pub use sync::{SyncObserver, SyncRunner, SyncSnapshot, SyncStatus};
