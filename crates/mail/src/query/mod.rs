//! Query API for UI consumption
//!
//! Pure functions that turn the loaded email collection into what the
//! list view shows: the filtered subset and its calendar tree.

mod filter;
mod group;

pub use filter::{FilterCriteria, ParseFilterError, ReadFilter, StarredFilter, UrgencyFilter, filter_emails};
pub use group::{
    DayBucket, DayGroup, GroupTree, MonthGroup, YearGroup, compare_within_day, group_emails, group_emails_in,
    received_day, sort_within_day, summary_kind,
};
