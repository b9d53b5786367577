//! Search input state machine
//!
//! Every keystroke bumps a generation counter. A lookup carries the
//! generation it was issued for and is only applied while that generation
//! is still current, so a superseded query can never overwrite the results
//! of a newer one.

use super::query_parser::{ParsedSearch, SearchScope, highlight_term, parse_search, suggestions};
use crate::models::Email;

/// Handle for one pending lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
    query: String,
}

impl SearchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Query to send to the backend
    pub fn query(&self) -> &str {
        &self.query
    }
}

/// What the search box shows
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SearchState {
    #[default]
    Idle,
    /// A `/` command is being typed
    Suggesting(Vec<SearchScope>),
    /// Waiting for the input to settle
    Pending { query: String },
    /// Lookup in flight
    Searching { query: String },
    Ready { query: String, results: Vec<Email> },
    /// Lookup failed; results are empty until the user types again
    Failed { query: String, message: String },
}

impl SearchState {
    /// Results to display, empty unless a lookup succeeded
    pub fn results(&self) -> &[Email] {
        match self {
            SearchState::Ready { results, .. } => results,
            _ => &[],
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, SearchState::Pending { .. } | SearchState::Searching { .. })
    }
}

#[derive(Debug, Default)]
pub struct SearchSession {
    input: String,
    generation: u64,
    state: SearchState,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw text of the search box
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn highlight_term(&self) -> Option<&str> {
        highlight_term(&self.input)
    }

    /// Record new input, superseding any pending or in-flight lookup
    ///
    /// Returns a ticket when the input is a complete query worth looking up.
    pub fn set_input(&mut self, raw: &str) -> Option<SearchTicket> {
        self.generation += 1;
        self.input = raw.to_string();

        let parsed = parse_search(raw);
        match parsed {
            ParsedSearch::Empty => {
                self.state = SearchState::Idle;
                None
            }
            ParsedSearch::Incomplete(_) => {
                self.state = SearchState::Suggesting(suggestions(raw));
                None
            }
            ParsedSearch::Text(_) | ParsedSearch::Scoped { .. } | ParsedSearch::Starred => {
                let query = raw.trim().to_string();
                self.state = SearchState::Pending { query: query.clone() };
                Some(SearchTicket {
                    generation: self.generation,
                    query,
                })
            }
        }
    }

    pub fn is_current(&self, ticket: &SearchTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Mark the lookup as in flight; false when the ticket was superseded
    pub fn start(&mut self, ticket: &SearchTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.state = SearchState::Searching {
            query: ticket.query.clone(),
        };
        true
    }

    /// Apply a lookup outcome; false (and no change) when it is stale
    pub fn resolve(&mut self, ticket: &SearchTicket, outcome: Result<Vec<Email>, String>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        let query = ticket.query.clone();
        self.state = match outcome {
            Ok(results) => SearchState::Ready { query, results },
            Err(message) => SearchState::Failed { query, message },
        };
        true
    }

    /// Swap an updated email into the visible results
    pub fn apply_update(&mut self, email: &Email) -> bool {
        let SearchState::Ready { results, .. } = &mut self.state else {
            return false;
        };
        match results.iter_mut().find(|e| e.id == email.id) {
            Some(existing) => {
                *existing = email.clone();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.set_input("");
    }
}
