//! Plain-text rendering of inbox views

use crate::expansion::{BucketPath, Expansion, children};
use mail::search::mark;
use mail::sync::SyncStatus;
use mail::{Email, GroupTree, Mailboxes, SearchState, Settings, resolve_summary, resolve_urgency, sort_within_day};
use std::fmt::Write;

const MARK_OPEN: &str = "[[";
const MARK_CLOSE: &str = "]]";

/// Labels for the settings the server knows about, in display order
pub const SETTING_LABELS: [(&str, &str); 9] = [
    ("IMAP_SERVER", "IMAP 服务器"),
    ("IMAP_PORT", "IMAP 端口"),
    ("IMAP_USERNAME", "IMAP 用户名"),
    ("IMAP_PASSWORD", "IMAP 密码"),
    ("MAILBOX", "邮箱"),
    ("FETCH_DAYS_AGO", "获取天数"),
    ("DB_PATH", "数据库路径"),
    ("OPENAI_MODEL", "OpenAI 模型"),
    ("OPENAI_BASE_URL", "OpenAI 基础 URL"),
];

fn highlighted(text: &str, term: Option<&str>) -> String {
    match term {
        Some(term) => mark(text, term, MARK_OPEN, MARK_CLOSE),
        None => text.to_string(),
    }
}

fn marker(open: bool) -> &'static str {
    if open { "[-]" } else { "[+]" }
}

/// One list row: urgency, flags, summary and sender
pub fn email_row(email: &Email, highlight: Option<&str>) -> String {
    let urgency = resolve_urgency(email).map(|u| u.as_str()).unwrap_or(" ");
    let star = if email.is_starred { "★" } else { " " };
    let unread = if email.is_read { " " } else { "●" };
    format!(
        "{unread}{star} [{urgency}] {}  <{}>  #{}",
        highlighted(resolve_summary(email), highlight),
        email.sender_display(),
        email.id
    )
}

/// Render the calendar tree, newest first, honoring the expansion state
pub fn render_tree(tree: &GroupTree<'_>, expansion: &Expansion, highlight: Option<&str>) -> String {
    let mut out = String::new();
    if tree.is_empty() {
        out.push_str("(没有邮件)\n");
    }

    for (&year, months) in tree.years().iter().rev() {
        let year_path = BucketPath::Year(year);
        let open = expansion.is_expanded(year_path);
        let _ = writeln!(out, "{} {year}", marker(open));
        if !open {
            continue;
        }

        for month_path in children(tree, year_path) {
            let BucketPath::Month(_, month) = month_path else {
                continue;
            };
            let open = expansion.is_expanded(month_path);
            let count: usize = months.get(&month).map(|days| days.values().map(Vec::len).sum()).unwrap_or(0);
            let _ = writeln!(out, "  {} {month}月 ({count})", marker(open));
            if !open {
                continue;
            }

            for day_path in children(tree, month_path) {
                let BucketPath::Day(bucket) = day_path else {
                    continue;
                };
                let emails = tree.day(bucket).unwrap_or_default();
                let open = expansion.is_expanded(day_path);
                let _ = writeln!(out, "    {} {}日 ({})", marker(open), bucket.day, emails.len());
                if !open {
                    continue;
                }
                for email in sort_within_day(emails) {
                    let _ = writeln!(out, "      {}", email_row(email, highlight));
                }
            }
        }
    }

    if tree.skipped() > 0 {
        let _ = writeln!(out, "({} 封邮件的日期无法识别)", tree.skipped());
    }
    out
}

/// Full view of one email
pub fn render_email(email: &Email, highlight: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "主题: {}", highlighted(&email.subject, highlight));
    let _ = writeln!(out, "发件人: {} <{}>", email.sender_display(), email.from_email);
    let _ = writeln!(out, "日期: {}", email.received_date);
    if let Some(mailbox) = &email.mailbox {
        let _ = writeln!(out, "邮箱: {mailbox}");
    }
    let urgency = resolve_urgency(email).map(|u| u.as_str()).unwrap_or("-");
    let _ = writeln!(
        out,
        "紧急程度: {urgency}  {}  {}",
        if email.is_starred { "★ 已加星" } else { "☆ 未加星" },
        if email.is_read { "已读" } else { "未读" }
    );

    if !email.analysis_markdown.trim().is_empty() {
        let _ = writeln!(out, "\n--- 分析 ---\n{}", highlighted(email.analysis_markdown.trim_end(), highlight));
    }
    let _ = writeln!(out, "\n--- 正文 ---\n{}", highlighted(email.raw_email_body.trim_end(), highlight));
    out
}

/// Search box state as text
pub fn render_search(state: &SearchState, highlight: Option<&str>) -> String {
    let mut out = String::new();
    match state {
        SearchState::Idle => {}
        SearchState::Suggesting(scopes) => {
            for scope in scopes {
                let _ = writeln!(out, "{:<12} {}", scope.prefix(), scope.description());
            }
        }
        SearchState::Pending { query } | SearchState::Searching { query } => {
            let _ = writeln!(out, "正在搜索 {query:?}...");
        }
        SearchState::Ready { query, results } => {
            let _ = writeln!(out, "{query:?}: {} 个结果", results.len());
            for email in results {
                let _ = writeln!(out, "  {}", email_row(email, highlight));
            }
        }
        SearchState::Failed { message, .. } => {
            let _ = writeln!(out, "{message}");
        }
    }
    out
}

fn is_secret(key: &str) -> bool {
    key.to_uppercase().contains("PASSWORD")
}

/// Settings with labels; secrets are masked
pub fn render_settings(settings: &Settings) -> String {
    let mut out = String::new();
    let known = SETTING_LABELS.iter().filter_map(|&(key, label)| settings.get(key).map(|v| (key, label, v)));
    let unknown = settings
        .iter()
        .filter(|(key, _)| !SETTING_LABELS.iter().any(|(k, _)| *k == key.as_str()))
        .map(|(key, value)| (key.as_str(), key.as_str(), value));

    for (key, label, value) in known.chain(unknown) {
        let shown = if is_secret(key) && !value.is_empty() {
            "********"
        } else {
            value.as_str()
        };
        let _ = writeln!(out, "{label} ({key}): {shown}");
    }
    out
}

pub fn render_mailboxes(mailboxes: &Mailboxes) -> String {
    let mut out = String::new();
    for (name, label) in mailboxes {
        let _ = writeln!(out, "{name}\t{label}");
    }
    out
}

/// Sync log lines past `seen`, plus the status line once the run ends
pub fn render_sync_progress(log: &[String], seen: usize, status: SyncStatus) -> String {
    let mut out = String::new();
    for line in log.iter().skip(seen) {
        let _ = writeln!(out, "{line}");
    }
    if status.is_terminal() {
        let _ = writeln!(out, "[{}]", status.label());
    }
    out
}
