//! Backend trait definitions

use std::collections::BTreeMap;

use anyhow::Result;

use crate::models::{Email, EmailId, StatusUpdate, Urgency};

/// Server settings by key
pub type Settings = BTreeMap<String, String>;

/// Mailbox names: raw IMAP name -> decoded display name
pub type Mailboxes = BTreeMap<String, String>;

/// Progress lines of one sync run, in arrival order
///
/// The iterator ends when the connection closes. An `Err` item is a
/// transport failure.
pub type SyncLines = Box<dyn Iterator<Item = Result<String>> + Send>;

/// Shuts the connection behind a [`SyncStream`], waking a blocked read
pub type StreamCloser = Box<dyn Fn() + Send + Sync>;

/// An open sync run: its lines plus a handle that closes the connection
/// from another thread
pub struct SyncStream {
    lines: SyncLines,
    closer: Option<StreamCloser>,
}

impl SyncStream {
    /// A stream whose connection closes when `lines` is dropped
    pub fn new(lines: SyncLines) -> Self {
        Self { lines, closer: None }
    }

    pub fn with_closer(mut self, closer: impl Fn() + Send + Sync + 'static) -> Self {
        self.closer = Some(Box::new(closer));
        self
    }

    pub fn into_parts(self) -> (SyncLines, Option<StreamCloser>) {
        (self.lines, self.closer)
    }
}

impl Iterator for SyncStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.next()
    }
}

/// Trait for the mail fetch/analysis server
///
/// Calls block; async callers run them on a blocking thread.
pub trait MailBackend: Send + Sync {
    /// Every stored email, newest first
    fn list_emails(&self) -> Result<Vec<Email>>;

    /// Set read/starred flags and return the updated email
    fn update_status(&self, id: &EmailId, update: &StatusUpdate) -> Result<Email>;

    /// Override the analyzer's urgency and return the updated email
    fn update_urgency(&self, id: &EmailId, level: Urgency) -> Result<Email>;

    fn list_settings(&self) -> Result<Settings>;

    fn list_mailboxes(&self) -> Result<Mailboxes>;

    /// Update existing settings keys, returning the server's message
    fn save_settings(&self, settings: &Settings) -> Result<String>;

    /// Ranked results for a raw search query, prefixes included
    fn search(&self, query: &str) -> Result<Vec<Email>>;

    /// Start a sync run and stream its progress lines
    fn open_sync_stream(&self) -> Result<SyncStream>;
}
