//! Calendar grouping and the within-day sort order
//!
//! Emails are bucketed by the local calendar date of `received_date`.
//! Dates that cannot be parsed keep the email out of the tree without
//! failing the whole grouping.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone};
use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed};
use icu_locale_core::locale;
use log::warn;

use crate::analysis::{resolve_summary, resolve_urgency};
use crate::models::{Email, Urgency};

/// Naive timestamp layouts accepted after the RFC forms
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// A (year, month, day) grouping key; month and day are 1-indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayBucket {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DayBucket {
    pub fn new(year: i32, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }
}

impl From<NaiveDate> for DayBucket {
    fn from(date: NaiveDate) -> Self {
        Self::new(date.year(), date.month(), date.day())
    }
}

impl fmt::Display for DayBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// Emails received on one day, in input order
pub type DayGroup<'a> = Vec<&'a Email>;
/// Day of month -> emails
pub type MonthGroup<'a> = BTreeMap<u32, DayGroup<'a>>;
/// Month -> days
pub type YearGroup<'a> = BTreeMap<u32, MonthGroup<'a>>;

/// Year -> month -> day tree borrowed from an email slice
///
/// Keys iterate ascending; display order is up to the consumer.
#[derive(Debug, Clone, Default)]
pub struct GroupTree<'a> {
    years: BTreeMap<i32, YearGroup<'a>>,
    skipped: usize,
}

impl<'a> GroupTree<'a> {
    pub fn years(&self) -> &BTreeMap<i32, YearGroup<'a>> {
        &self.years
    }

    pub fn day(&self, bucket: DayBucket) -> Option<&[&'a Email]> {
        self.years
            .get(&bucket.year)?
            .get(&bucket.month)?
            .get(&bucket.day)
            .map(Vec::as_slice)
    }

    /// Every non-empty bucket with its emails, ascending
    pub fn buckets(&self) -> impl Iterator<Item = (DayBucket, &[&'a Email])> + '_ {
        self.years.iter().flat_map(|(&year, months)| {
            months.iter().flat_map(move |(&month, days)| {
                days.iter()
                    .map(move |(&day, emails)| (DayBucket::new(year, month, day), emails.as_slice()))
            })
        })
    }

    /// Number of emails placed in a bucket
    pub fn len(&self) -> usize {
        self.buckets().map(|(_, emails)| emails.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Number of emails left out because their date did not parse
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn insert(&mut self, bucket: DayBucket, email: &'a Email) {
        self.years
            .entry(bucket.year)
            .or_default()
            .entry(bucket.month)
            .or_default()
            .entry(bucket.day)
            .or_default()
            .push(email);
    }
}

/// Group emails by their date in the local time zone
pub fn group_emails<'a, I>(emails: I) -> GroupTree<'a>
where
    I: IntoIterator<Item = &'a Email>,
{
    group_emails_in(emails, &Local)
}

/// Group emails by their date as seen from `tz`
pub fn group_emails_in<'a, I, Tz>(emails: I, tz: &Tz) -> GroupTree<'a>
where
    I: IntoIterator<Item = &'a Email>,
    Tz: TimeZone,
{
    let mut tree = GroupTree::default();

    for email in emails {
        match received_day(&email.received_date, tz) {
            Some(date) => tree.insert(date.into(), email),
            None => {
                warn!(
                    "Skipping email {} with unparseable date {:?}",
                    email.id, email.received_date
                );
                tree.skipped += 1;
            }
        }
    }

    tree
}

/// Calendar date of a received timestamp as seen from `tz`
pub fn received_day<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<NaiveDate> {
    let raw = strip_comment(raw.trim());
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(tz).date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(tz).date_naive());
    }

    // Zone-less timestamps are already local
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.date())
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
}

/// Drop a trailing `(CST)` style zone comment
fn strip_comment(raw: &str) -> &str {
    if raw.ends_with(')') {
        if let Some(open) = raw.rfind('(') {
            return raw[..open].trim_end();
        }
    }
    raw
}

/// Order a day's emails: urgency, then summary kind, then summary text
///
/// The sort is stable and the comparator total, so sorting an already
/// sorted day changes nothing.
pub fn sort_within_day<'a>(emails: &[&'a Email]) -> Vec<&'a Email> {
    let mut keyed: Vec<(SortKey<'a>, &'a Email)> =
        emails.iter().map(|&email| (SortKey::of(email), email)).collect();
    keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
    keyed.into_iter().map(|(_, email)| email).collect()
}

/// Comparator used by [`sort_within_day`]
pub fn compare_within_day(a: &Email, b: &Email) -> Ordering {
    SortKey::of(a).cmp(&SortKey::of(b))
}

#[derive(Debug)]
struct SortKey<'a> {
    urgency: u8,
    kind: u8,
    summary: &'a str,
}

impl<'a> SortKey<'a> {
    fn of(email: &'a Email) -> Self {
        let summary = resolve_summary(email);
        Self {
            urgency: Urgency::rank(resolve_urgency(email)),
            kind: summary_kind(summary),
            summary,
        }
    }
}

impl Ord for SortKey<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.urgency
            .cmp(&other.urgency)
            .then(self.kind.cmp(&other.kind))
            .then_with(|| collate(self.summary, other.summary))
    }
}

impl PartialEq for SortKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey<'_> {}

impl PartialOrd for SortKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Rank of a summary by its first character: digit, Latin, CJK, other
pub fn summary_kind(summary: &str) -> u8 {
    match summary.chars().next() {
        Some(c) if c.is_ascii_digit() => 1,
        Some(c) if c.is_ascii_alphabetic() => 2,
        Some('\u{4e00}'..='\u{9fa5}') => 3,
        _ => 4,
    }
}

thread_local! {
    static ZH_COLLATOR: Option<CollatorBorrowed<'static>> =
        match Collator::try_new(locale!("zh").into(), CollatorOptions::default()) {
            Ok(collator) => Some(collator),
            Err(e) => {
                warn!("Chinese collation data unavailable, sorting by code point: {}", e);
                None
            }
        };
}

/// Chinese-locale comparison: pinyin order for Han text, dictionary order for Latin
fn collate(a: &str, b: &str) -> Ordering {
    ZH_COLLATOR.with(|collator| match collator {
        Some(collator) => collator.compare(a, b),
        None => a.cmp(b),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisPayload;
    use chrono::{FixedOffset, Utc};

    fn dated(id: &str, date: &str) -> Email {
        Email::builder(id).received_date(date).build()
    }

    fn ranked(id: &str, urgency: Option<&str>, summary: &str) -> Email {
        let mut payload = AnalysisPayload::new().with_entry("邮件摘要", [("**主题**", summary)]);
        if let Some(level) = urgency {
            payload = payload.with_entry("邮件紧急程度评估", [("- **紧急程度**", level)]);
        }
        Email::builder(id)
            .subject(format!("raw {id}"))
            .received_date("2025-07-25 09:00:00")
            .analysis(payload)
            .build()
    }

    fn ids(emails: &[&Email]) -> Vec<String> {
        emails.iter().map(|e| e.id.0.clone()).collect()
    }

    fn beijing() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[test]
    fn test_parse_rfc2822_in_zone() {
        let raw = "Fri, 25 Jul 2025 00:11:51 +0800";
        assert_eq!(
            received_day(raw, &beijing()),
            NaiveDate::from_ymd_opt(2025, 7, 25)
        );
        assert_eq!(received_day(raw, &Utc), NaiveDate::from_ymd_opt(2025, 7, 24));
    }

    #[test]
    fn test_parse_other_layouts() {
        let tz = beijing();
        let expected = NaiveDate::from_ymd_opt(2025, 7, 25);
        assert_eq!(received_day("Fri, 25 Jul 2025 10:00:00 +0800 (CST)", &tz), expected);
        assert_eq!(received_day("2025-07-24T16:30:00Z", &tz), expected);
        assert_eq!(received_day("2025-07-25 10:00:00", &tz), expected);
        assert_eq!(received_day("2025-07-25T10:00:00.123", &tz), expected);
        assert_eq!(received_day("2025-07-25", &tz), expected);
        assert_eq!(received_day("yesterday", &tz), None);
        assert_eq!(received_day("", &tz), None);
    }

    #[test]
    fn test_grouping_covers_every_parseable_email() {
        let emails = vec![
            dated("1", "2025-07-25 09:00:00"),
            dated("2", "2025-07-25 18:00:00"),
            dated("3", "2025-07-01 08:00:00"),
            dated("4", "not a date"),
            dated("5", "2024-12-31 23:59:59"),
        ];

        let tree = group_emails_in(&emails, &beijing());

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.skipped(), 1);
        assert_eq!(tree.years().keys().copied().collect::<Vec<_>>(), vec![2024, 2025]);
        assert_eq!(ids(tree.day(DayBucket::new(2025, 7, 25)).unwrap()), vec!["1", "2"]);
        assert_eq!(ids(tree.day(DayBucket::new(2025, 7, 1)).unwrap()), vec!["3"]);
        assert!(tree.day(DayBucket::new(2025, 7, 2)).is_none());

        let buckets: Vec<String> = tree.buckets().map(|(b, _)| b.to_string()).collect();
        assert_eq!(buckets, vec!["2024-12-31", "2025-07-01", "2025-07-25"]);

        // The source slice is untouched
        assert_eq!(emails.len(), 5);
    }

    #[test]
    fn test_empty_input() {
        let tree = group_emails_in(std::iter::empty(), &Utc);
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
    }

    #[test]
    fn test_sort_by_urgency_first() {
        let emails = vec![
            ranked("none", None, "alpha"),
            ranked("low", Some("低"), "alpha"),
            ranked("high", Some("高"), "zulu"),
            ranked("mid", Some("中"), "alpha"),
        ];
        let refs: Vec<&Email> = emails.iter().collect();
        assert_eq!(ids(&sort_within_day(&refs)), vec!["high", "mid", "low", "none"]);
    }

    #[test]
    fn test_sort_by_summary_kind_then_text() {
        let emails = vec![
            ranked("cjk", Some("中"), "会议通知"),
            ranked("other", Some("中"), "【公告】"),
            ranked("latin-b", Some("中"), "beta"),
            ranked("digit", Some("中"), "2025 plan"),
            ranked("latin-a", Some("中"), "Alpha"),
        ];
        let refs: Vec<&Email> = emails.iter().collect();
        assert_eq!(
            ids(&sort_within_day(&refs)),
            vec!["digit", "latin-a", "latin-b", "cjk", "other"]
        );
    }

    #[test]
    fn test_sort_is_idempotent() {
        let emails = vec![
            ranked("a", None, "same"),
            ranked("b", Some("高"), "same"),
            ranked("c", None, "same"),
            ranked("d", Some("高"), "Same"),
        ];
        let refs: Vec<&Email> = emails.iter().collect();
        let once = sort_within_day(&refs);
        let twice = sort_within_day(&once);
        assert_eq!(ids(&once), ids(&twice));
        assert_eq!(ids(&once), vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_chinese_summaries_sort_by_pinyin() {
        let emails = vec![
            ranked("zhang", Some("中"), "账单"),
            ranked("hui", Some("中"), "会议通知"),
            ranked("bao", Some("中"), "报告提交"),
        ];
        let refs: Vec<&Email> = emails.iter().collect();
        assert_eq!(ids(&sort_within_day(&refs)), vec!["bao", "hui", "zhang"]);
    }

    #[test]
    fn test_sort_key_equality_follows_ordering() {
        let a = ranked("a", Some("高"), "同一主题");
        let b = ranked("b", Some("高"), "同一主题");
        let c = ranked("c", Some("低"), "同一主题");
        assert_eq!(SortKey::of(&a), SortKey::of(&b));
        assert_ne!(SortKey::of(&a), SortKey::of(&c));
        assert_eq!(compare_within_day(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_summary_kind() {
        assert_eq!(summary_kind("42"), 1);
        assert_eq!(summary_kind("x"), 2);
        assert_eq!(summary_kind("邮件"), 3);
        assert_eq!(summary_kind("【"), 4);
        assert_eq!(summary_kind(""), 4);
        assert_eq!(compare_within_day(&ranked("1", None, "a"), &ranked("2", None, "b")), Ordering::Less);
    }
}
