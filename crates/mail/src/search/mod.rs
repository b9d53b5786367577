//! Search subsystem
//!
//! Parses scoped `/prefix:` queries, debounces input, runs lookups in the
//! background and keeps only the results of the latest query.

mod controller;
mod highlight;
mod query_parser;
mod session;

pub use controller::SearchController;
pub use highlight::{HighlightSpan, highlight_spans, mark};
pub use query_parser::{ParsedSearch, SearchScope, highlight_term, parse_search, suggestions};
pub use session::{SearchSession, SearchState, SearchTicket};
