//! In-memory backend
//!
//! Serves fixtures for the shell and scripted sync runs for tests.

use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use serde::Deserialize;

use super::traits::{MailBackend, Mailboxes, Settings, SyncStream};
use super::BackendError;
use crate::analysis::set_urgency;
use crate::models::{Email, EmailId, StatusUpdate, Urgency};
use crate::search::{ParsedSearch, SearchScope, parse_search};

/// Fixture file contents: a bare email list or a full snapshot
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Fixture {
    Emails(Vec<Email>),
    Snapshot {
        emails: Vec<Email>,
        #[serde(default)]
        settings: Settings,
        #[serde(default)]
        mailboxes: Mailboxes,
        #[serde(default)]
        sync: Vec<String>,
    },
}

/// In-memory implementation of MailBackend
///
/// Emails are kept newest first, the order the server returns them in.
pub struct InMemoryBackend {
    emails: RwLock<Vec<Email>>,
    settings: RwLock<Settings>,
    mailboxes: RwLock<Mailboxes>,
    sync_script: RwLock<Vec<String>>,
    /// Transport error raised after the scripted lines
    sync_failure: RwLock<Option<String>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryBackend {
    /// Create a new empty backend
    pub fn new() -> Self {
        Self {
            emails: RwLock::new(Vec::new()),
            settings: RwLock::new(Settings::new()),
            mailboxes: RwLock::new(Mailboxes::new()),
            sync_script: RwLock::new(Vec::new()),
            sync_failure: RwLock::new(None),
        }
    }

    pub fn with_emails(emails: Vec<Email>) -> Self {
        let backend = Self::new();
        *write(&backend.emails) = emails;
        backend
    }

    /// Load a JSON fixture: either an email array or an object with
    /// `emails`, `settings`, `mailboxes` and `sync` lines
    pub fn from_fixture(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        let fixture: Fixture = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse fixture {}", path.display()))?;

        let backend = match fixture {
            Fixture::Emails(emails) => Self::with_emails(emails),
            Fixture::Snapshot {
                emails,
                settings,
                mailboxes,
                sync,
            } => {
                let backend = Self::with_emails(emails);
                backend.set_settings(settings);
                backend.set_mailboxes(mailboxes);
                backend.set_sync_script(sync);
                backend
            }
        };
        debug!("Loaded fixture {} with {} emails", path.display(), read(&backend.emails).len());
        Ok(backend)
    }

    pub fn insert_email(&self, email: Email) {
        let mut emails = write(&self.emails);
        match emails.iter_mut().find(|e| e.id == email.id) {
            Some(existing) => *existing = email,
            None => emails.insert(0, email),
        }
    }

    pub fn set_settings(&self, settings: Settings) {
        *write(&self.settings) = settings;
    }

    pub fn set_mailboxes(&self, mailboxes: Mailboxes) {
        *write(&self.mailboxes) = mailboxes;
    }

    /// Lines the next sync run will stream
    pub fn set_sync_script<I, S>(&self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *write(&self.sync_script) = lines.into_iter().map(Into::into).collect();
    }

    /// Make the next sync runs fail with a transport error after the script
    pub fn set_sync_failure(&self, message: Option<String>) {
        *write(&self.sync_failure) = message;
    }

    /// Snapshot of the stored emails
    pub fn emails(&self) -> Vec<Email> {
        read(&self.emails).clone()
    }

    fn modify<F>(&self, id: &EmailId, f: F) -> Result<Email>
    where
        F: FnOnce(&mut Email),
    {
        let mut emails = write(&self.emails);
        let email = emails
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| BackendError::NotFound(format!("email {id}")))?;
        f(email);
        Ok(email.clone())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Whether `email` matches a lower-cased term within `scope`
fn matches_scope(email: &Email, scope: SearchScope, needle: &str) -> bool {
    match scope {
        SearchScope::From => {
            contains(&email.from_email, needle)
                || email.from_name.as_deref().is_some_and(|name| contains(name, needle))
        }
        SearchScope::Subject => contains(&email.subject, needle),
        SearchScope::Body => contains(&email.raw_email_body, needle),
        SearchScope::Analysis => {
            contains(&email.analysis_markdown, needle)
                || email.analysis_json.values().any(|value| contains(value, needle))
        }
        SearchScope::Starred => email.is_starred,
    }
}

impl MailBackend for InMemoryBackend {
    fn list_emails(&self) -> Result<Vec<Email>> {
        Ok(self.emails())
    }

    fn update_status(&self, id: &EmailId, update: &StatusUpdate) -> Result<Email> {
        if update.is_empty() {
            return Err(anyhow!("status update for {id} sets nothing"));
        }
        self.modify(id, |email| update.apply(email))
    }

    fn update_urgency(&self, id: &EmailId, level: Urgency) -> Result<Email> {
        self.modify(id, |email| {
            email.analysis_markdown = set_urgency(&mut email.analysis_json, &email.analysis_markdown, level);
        })
    }

    fn list_settings(&self) -> Result<Settings> {
        Ok(read(&self.settings).clone())
    }

    fn list_mailboxes(&self) -> Result<Mailboxes> {
        Ok(read(&self.mailboxes).clone())
    }

    fn save_settings(&self, settings: &Settings) -> Result<String> {
        let mut stored = write(&self.settings);
        for (key, value) in settings {
            match stored.get_mut(key) {
                Some(existing) => *existing = value.clone(),
                None => warn!("Ignoring unknown settings key {key}"),
            }
        }
        Ok("设置已保存".to_string())
    }

    fn search(&self, query: &str) -> Result<Vec<Email>> {
        let emails = read(&self.emails);
        let results = match parse_search(query) {
            ParsedSearch::Empty | ParsedSearch::Incomplete(_) => Vec::new(),
            ParsedSearch::Starred => emails.iter().filter(|e| e.is_starred).cloned().collect(),
            ParsedSearch::Scoped { scope, term } => {
                let needle = term.to_lowercase();
                emails
                    .iter()
                    .filter(|e| matches_scope(e, scope, &needle))
                    .cloned()
                    .collect()
            }
            ParsedSearch::Text(term) => {
                let needle = term.to_lowercase();
                emails
                    .iter()
                    .filter(|e| {
                        [SearchScope::From, SearchScope::Subject, SearchScope::Body, SearchScope::Analysis]
                            .into_iter()
                            .any(|scope| matches_scope(e, scope, &needle))
                    })
                    .cloned()
                    .collect()
            }
        };
        debug!("Search {:?} matched {} emails", query, results.len());
        Ok(results)
    }

    fn open_sync_stream(&self) -> Result<SyncStream> {
        let lines: Vec<Result<String>> = read(&self.sync_script).iter().cloned().map(Ok).collect();
        let failure = read(&self.sync_failure)
            .clone()
            .map(|message| Err(anyhow!(message)));
        Ok(SyncStream::new(Box::new(lines.into_iter().chain(failure))))
    }
}
