//! Filter engine for the visible email set

use std::fmt;
use std::str::FromStr;

use crate::analysis::resolve_urgency;
use crate::models::{Email, Urgency};

/// Urgency criterion: everything, or one level exactly
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UrgencyFilter {
    #[default]
    All,
    Only(Urgency),
}

/// Read-state criterion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReadFilter {
    #[default]
    All,
    Unread,
    Read,
}

/// Starred-state criterion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StarredFilter {
    #[default]
    All,
    Starred,
}

impl UrgencyFilter {
    /// all -> 高 -> 中 -> 低 -> all
    pub fn cycle(self) -> Self {
        match self {
            UrgencyFilter::All => UrgencyFilter::Only(Urgency::High),
            UrgencyFilter::Only(Urgency::High) => UrgencyFilter::Only(Urgency::Medium),
            UrgencyFilter::Only(Urgency::Medium) => UrgencyFilter::Only(Urgency::Low),
            UrgencyFilter::Only(Urgency::Low) => UrgencyFilter::All,
        }
    }

    pub fn matches(self, email: &Email) -> bool {
        match self {
            UrgencyFilter::All => true,
            UrgencyFilter::Only(level) => resolve_urgency(email) == Some(level),
        }
    }

    /// Short button label
    pub fn label(self) -> &'static str {
        match self {
            UrgencyFilter::All => "全",
            UrgencyFilter::Only(level) => level.as_str(),
        }
    }
}

impl ReadFilter {
    /// all -> unread -> read -> all
    pub fn cycle(self) -> Self {
        match self {
            ReadFilter::All => ReadFilter::Unread,
            ReadFilter::Unread => ReadFilter::Read,
            ReadFilter::Read => ReadFilter::All,
        }
    }

    pub fn matches(self, email: &Email) -> bool {
        match self {
            ReadFilter::All => true,
            ReadFilter::Unread => !email.is_read,
            ReadFilter::Read => email.is_read,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReadFilter::All => "全部",
            ReadFilter::Unread => "未读",
            ReadFilter::Read => "已读",
        }
    }
}

impl StarredFilter {
    /// all -> starred -> all
    pub fn cycle(self) -> Self {
        match self {
            StarredFilter::All => StarredFilter::Starred,
            StarredFilter::Starred => StarredFilter::All,
        }
    }

    pub fn matches(self, email: &Email) -> bool {
        match self {
            StarredFilter::All => true,
            StarredFilter::Starred => email.is_starred,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StarredFilter::All => "全部",
            StarredFilter::Starred => "加星",
        }
    }
}

/// The three independent criteria, combined with AND
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FilterCriteria {
    pub urgency: UrgencyFilter,
    pub read: ReadFilter,
    pub starred: StarredFilter,
}

impl FilterCriteria {
    pub fn new(urgency: UrgencyFilter, read: ReadFilter, starred: StarredFilter) -> Self {
        Self {
            urgency,
            read,
            starred,
        }
    }

    pub fn matches(&self, email: &Email) -> bool {
        self.urgency.matches(email) && self.read.matches(email) && self.starred.matches(email)
    }

    pub fn is_unfiltered(&self) -> bool {
        *self == Self::default()
    }
}

/// Keep the emails matching every criterion, in input order
pub fn filter_emails<'a, I>(emails: I, criteria: &FilterCriteria) -> Vec<&'a Email>
where
    I: IntoIterator<Item = &'a Email>,
{
    emails
        .into_iter()
        .filter(|email| criteria.matches(email))
        .collect()
}

/// Error returned when a filter name is not recognized
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} filter: {value:?}")]
pub struct ParseFilterError {
    kind: &'static str,
    value: String,
}

impl FromStr for UrgencyFilter {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "全" => Ok(UrgencyFilter::All),
            other => other.parse().map(UrgencyFilter::Only).map_err(|_| ParseFilterError {
                kind: "urgency",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for ReadFilter {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "全部" => Ok(ReadFilter::All),
            "unread" | "未读" => Ok(ReadFilter::Unread),
            "read" | "已读" => Ok(ReadFilter::Read),
            _ => Err(ParseFilterError {
                kind: "read",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for StarredFilter {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "全部" => Ok(StarredFilter::All),
            "starred" | "加星" => Ok(StarredFilter::Starred),
            _ => Err(ParseFilterError {
                kind: "starred",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for FilterCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] [{}]",
            self.urgency.label(),
            self.read.label(),
            self.starred.label()
        )
    }
}
