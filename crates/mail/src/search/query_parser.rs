//! Search query parser
//!
//! A query starting with `/` is a scoped command:
//! - `/from:alice` - sender name or address
//! - `/subject:invoice` - subject line
//! - `/body:refund` - message body
//! - `/analysis:deadline` - analyzer output
//! - `/starred` - starred emails, takes no term
//!
//! Anything else is a plain full-text query.

use std::fmt;

/// Field a scoped query searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchScope {
    From,
    Subject,
    Body,
    Analysis,
    Starred,
}

impl SearchScope {
    /// Suggestion order
    pub const ALL: [SearchScope; 5] = [
        SearchScope::From,
        SearchScope::Subject,
        SearchScope::Body,
        SearchScope::Analysis,
        SearchScope::Starred,
    ];

    /// Text inserted into the query box when the suggestion is picked
    pub fn prefix(&self) -> &'static str {
        match self {
            SearchScope::From => "/from:",
            SearchScope::Subject => "/subject:",
            SearchScope::Body => "/body:",
            SearchScope::Analysis => "/analysis:",
            SearchScope::Starred => "/starred",
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SearchScope::From => "from",
            SearchScope::Subject => "subject",
            SearchScope::Body => "body",
            SearchScope::Analysis => "analysis",
            SearchScope::Starred => "starred",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SearchScope::From => "按发件人搜索",
            SearchScope::Subject => "按主题搜索",
            SearchScope::Body => "按正文搜索",
            SearchScope::Analysis => "按分析内容搜索",
            SearchScope::Starred => "查看加星邮件",
        }
    }

    /// Whether the scope expects a term after the colon
    pub fn takes_term(&self) -> bool {
        !matches!(self, SearchScope::Starred)
    }

    fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|scope| scope.keyword().eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Classified search input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedSearch<'a> {
    /// Nothing typed
    Empty,
    /// Full-text query
    Text(&'a str),
    /// Field-scoped query with a non-empty term
    Scoped { scope: SearchScope, term: &'a str },
    /// The `/starred` command
    Starred,
    /// A `/` command still being typed
    Incomplete(&'a str),
}

impl ParsedSearch<'_> {
    /// Whether the input is ready to send as a lookup
    pub fn is_executable(&self) -> bool {
        matches!(
            self,
            ParsedSearch::Text(_) | ParsedSearch::Scoped { .. } | ParsedSearch::Starred
        )
    }
}

/// Parse raw search box input
///
/// Unknown `/word:` commands fall through to full-text so the lookup
/// backend decides what to do with them.
pub fn parse_search(input: &str) -> ParsedSearch<'_> {
    let query = input.trim();
    if query.is_empty() {
        return ParsedSearch::Empty;
    }

    let Some(command) = query.strip_prefix('/') else {
        return ParsedSearch::Text(query);
    };

    match command.split_once(':') {
        Some((keyword, term)) => match SearchScope::from_keyword(keyword.trim()) {
            Some(SearchScope::Starred) => ParsedSearch::Starred,
            Some(_) if term.trim().is_empty() => ParsedSearch::Incomplete(query),
            Some(scope) => ParsedSearch::Scoped {
                scope,
                term: term.trim(),
            },
            None => ParsedSearch::Text(query),
        },
        None if command.eq_ignore_ascii_case(SearchScope::Starred.keyword()) => ParsedSearch::Starred,
        None => ParsedSearch::Incomplete(query),
    }
}

/// Scope prefixes matching a command still being typed
///
/// Empty unless the input is an incomplete `/` command.
pub fn suggestions(input: &str) -> Vec<SearchScope> {
    let ParsedSearch::Incomplete(query) = parse_search(input) else {
        return Vec::new();
    };

    let typed = query.split(':').next().unwrap_or(query).to_lowercase();
    SearchScope::ALL
        .into_iter()
        .filter(|scope| scope.prefix().starts_with(&typed))
        .collect()
}

/// Term to highlight in results for this query
///
/// Scoped queries highlight the text after the first colon, plain queries
/// the whole input. `/starred` has nothing to highlight.
pub fn highlight_term(input: &str) -> Option<&str> {
    let term = match parse_search(input) {
        ParsedSearch::Empty | ParsedSearch::Starred => return None,
        ParsedSearch::Text(query) if !query.starts_with('/') => query,
        ParsedSearch::Text(query) | ParsedSearch::Incomplete(query) => {
            query.split_once(':').map_or(query, |(_, term)| term)
        }
        ParsedSearch::Scoped { term, .. } => term,
    };
    let term = term.trim();
    (!term.is_empty()).then_some(term)
}
