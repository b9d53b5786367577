//! Collapsed / expanded state of the calendar tree

use crate::cli::Depth;
use mail::{DayBucket, GroupTree};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// A node of the calendar tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketPath {
    Year(i32),
    Month(i32, u32),
    Day(DayBucket),
}

impl fmt::Display for BucketPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketPath::Year(year) => write!(f, "{year:04}"),
            BucketPath::Month(year, month) => write!(f, "{year:04}-{month:02}"),
            BucketPath::Day(bucket) => write!(f, "{bucket}"),
        }
    }
}

/// Parses `YYYY`, `YYYY-MM` or `YYYY-MM-DD`
impl FromStr for BucketPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("expected YYYY, YYYY-MM or YYYY-MM-DD, got {s:?}");
        let parts: Vec<&str> = s.trim().split('-').collect();
        let year: i32 = parts[0].parse().map_err(|_| invalid())?;
        let number = |i: usize, max: u32| -> Result<u32, String> {
            parts[i]
                .parse()
                .ok()
                .filter(|n| (1..=max).contains(n))
                .ok_or_else(invalid)
        };
        match parts.len() {
            1 => Ok(BucketPath::Year(year)),
            2 => Ok(BucketPath::Month(year, number(1, 12)?)),
            3 => Ok(BucketPath::Day(DayBucket::new(year, number(1, 12)?, number(2, 31)?))),
            _ => Err(invalid()),
        }
    }
}

/// Which tree nodes are open
///
/// Nodes never touched count as collapsed.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    expanded: HashMap<BucketPath, bool>,
}

impl Expansion {
    /// Every year open, everything below it closed
    pub fn initial(tree: &GroupTree<'_>) -> Self {
        let mut expansion = Self::default();
        for &year in tree.years().keys() {
            expansion.expanded.insert(BucketPath::Year(year), true);
        }
        expansion
    }

    pub fn is_expanded(&self, path: BucketPath) -> bool {
        self.expanded.get(&path).copied().unwrap_or(false)
    }

    pub fn toggle(&mut self, path: BucketPath) {
        let open = self.is_expanded(path);
        self.expanded.insert(path, !open);
    }

    /// Collapse all of `children` if any is open, otherwise open them all
    pub fn toggle_children(&mut self, children: &[BucketPath]) {
        let open = !children.iter().any(|&path| self.is_expanded(path));
        for &path in children {
            self.expanded.insert(path, open);
        }
    }

    /// Open every node down to `depth`
    pub fn expand_to_depth(&mut self, tree: &GroupTree<'_>, depth: Depth) {
        for (&year, months) in tree.years() {
            self.expanded.insert(BucketPath::Year(year), true);
            if depth == Depth::Year {
                continue;
            }
            for (&month, days) in months {
                self.expanded.insert(BucketPath::Month(year, month), true);
                if depth == Depth::Month {
                    continue;
                }
                for &day in days.keys() {
                    self.expanded.insert(BucketPath::Day(DayBucket::new(year, month, day)), true);
                }
            }
        }
    }
}

/// Direct children of a node, in display order (newest first)
pub fn children(tree: &GroupTree<'_>, path: BucketPath) -> Vec<BucketPath> {
    match path {
        BucketPath::Year(year) => tree
            .years()
            .get(&year)
            .map(|months| months.keys().rev().map(|&month| BucketPath::Month(year, month)).collect())
            .unwrap_or_default(),
        BucketPath::Month(year, month) => tree
            .years()
            .get(&year)
            .and_then(|months| months.get(&month))
            .map(|days| {
                days.keys()
                    .rev()
                    .map(|&day| BucketPath::Day(DayBucket::new(year, month, day)))
                    .collect()
            })
            .unwrap_or_default(),
        BucketPath::Day(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail::Email;
    use mail::query::group_emails_in;

    fn sample() -> Vec<Email> {
        [
            ("1", "2024-12-31T09:00:00+00:00"),
            ("2", "2025-01-02T09:00:00+00:00"),
            ("3", "2025-01-03T09:00:00+00:00"),
            ("4", "2025-02-10T09:00:00+00:00"),
        ]
        .into_iter()
        .map(|(id, date)| Email::builder(id).subject(id).received_date(date).build())
        .collect()
    }

    #[test]
    fn test_initial_opens_years_only() {
        let emails = sample();
        let tree = group_emails_in(&emails, &chrono::Utc);
        let expansion = Expansion::initial(&tree);

        assert!(expansion.is_expanded(BucketPath::Year(2024)));
        assert!(expansion.is_expanded(BucketPath::Year(2025)));
        assert!(!expansion.is_expanded(BucketPath::Month(2025, 1)));
    }

    #[test]
    fn test_toggle_flips_one_node() {
        let mut expansion = Expansion::default();
        expansion.toggle(BucketPath::Month(2025, 1));
        assert!(expansion.is_expanded(BucketPath::Month(2025, 1)));
        expansion.toggle(BucketPath::Month(2025, 1));
        assert!(!expansion.is_expanded(BucketPath::Month(2025, 1)));
    }

    #[test]
    fn test_toggle_children_collapses_when_any_open() {
        let emails = sample();
        let tree = group_emails_in(&emails, &chrono::Utc);
        let months = children(&tree, BucketPath::Year(2025));
        assert_eq!(months, vec![BucketPath::Month(2025, 2), BucketPath::Month(2025, 1)]);

        let mut expansion = Expansion::initial(&tree);
        expansion.toggle_children(&months);
        assert!(months.iter().all(|&m| expansion.is_expanded(m)));

        expansion.toggle(BucketPath::Month(2025, 2));
        expansion.toggle_children(&months);
        assert!(months.iter().all(|&m| !expansion.is_expanded(m)));
    }

    #[test]
    fn test_expand_to_depth() {
        let emails = sample();
        let tree = group_emails_in(&emails, &chrono::Utc);

        let mut expansion = Expansion::default();
        expansion.expand_to_depth(&tree, Depth::Month);
        assert!(expansion.is_expanded(BucketPath::Month(2024, 12)));
        assert!(!expansion.is_expanded(BucketPath::Day(DayBucket::new(2024, 12, 31))));

        expansion.expand_to_depth(&tree, Depth::Day);
        assert!(expansion.is_expanded(BucketPath::Day(DayBucket::new(2025, 1, 3))));
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!("2025".parse(), Ok(BucketPath::Year(2025)));
        assert_eq!("2025-01".parse(), Ok(BucketPath::Month(2025, 1)));
        assert_eq!(
            "2025-01-03".parse(),
            Ok(BucketPath::Day(DayBucket::new(2025, 1, 3)))
        );
        assert!("2025-13".parse::<BucketPath>().is_err());
        assert!("2025-01-02-03".parse::<BucketPath>().is_err());
        assert!("soon".parse::<BucketPath>().is_err());
        assert_eq!(BucketPath::Month(2025, 1).to_string(), "2025-01");
    }

    #[test]
    fn test_children_of_day_and_missing_nodes() {
        let emails = sample();
        let tree = group_emails_in(&emails, &chrono::Utc);
        assert!(children(&tree, BucketPath::Day(DayBucket::new(2025, 1, 2))).is_empty());
        assert!(children(&tree, BucketPath::Year(1999)).is_empty());
        assert_eq!(
            children(&tree, BucketPath::Month(2025, 1)),
            vec![
                BucketPath::Day(DayBucket::new(2025, 1, 3)),
                BucketPath::Day(DayBucket::new(2025, 1, 2)),
            ]
        );
    }
}
