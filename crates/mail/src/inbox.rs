//! Shell-owned mailbox state
//!
//! Holds the loaded email collection, the open email and the filter
//! criteria. Updates from the backend are applied one at a time; network
//! failures are kept in [`Inbox::error`] for display instead of being
//! propagated.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use chrono::TimeZone;
use log::{error, info};

use crate::analysis::resolve_urgency;
use crate::backend::MailBackend;
use crate::models::{Email, EmailId, StatusUpdate, Urgency};
use crate::query::{FilterCriteria, GroupTree, filter_emails, group_emails, group_emails_in};
use crate::sync::SyncObserver;

pub struct Inbox {
    backend: Arc<dyn MailBackend>,
    emails: Vec<Email>,
    selected: Option<Email>,
    criteria: FilterCriteria,
    error: Option<String>,
}

impl Inbox {
    pub fn new(backend: Arc<dyn MailBackend>) -> Self {
        Self {
            backend,
            emails: Vec::new(),
            selected: None,
            criteria: FilterCriteria::default(),
            error: None,
        }
    }

    pub fn backend(&self) -> &Arc<dyn MailBackend> {
        &self.backend
    }

    pub fn emails(&self) -> &[Email] {
        &self.emails
    }

    pub fn selected(&self) -> Option<&Email> {
        self.selected.as_ref()
    }

    pub fn criteria(&self) -> FilterCriteria {
        self.criteria
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
    }

    pub fn cycle_urgency_filter(&mut self) {
        self.criteria.urgency = self.criteria.urgency.cycle();
    }

    pub fn cycle_read_filter(&mut self) {
        self.criteria.read = self.criteria.read.cycle();
    }

    pub fn cycle_starred_filter(&mut self) {
        self.criteria.starred = self.criteria.starred.cycle();
    }

    /// Last network failure, if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn find(&self, id: &EmailId) -> Option<&Email> {
        self.emails.iter().find(|e| &e.id == id)
    }

    /// Replace the collection from the backend
    ///
    /// On failure the current collection is kept.
    pub fn reload(&mut self) -> bool {
        match self.backend.list_emails() {
            Ok(emails) => {
                info!("Inbox reloaded with {} emails", emails.len());
                self.emails = emails;
                self.error = None;
                true
            }
            Err(e) => {
                self.record_error("获取邮件失败", &e);
                false
            }
        }
    }

    /// Emails passing the current filters, in collection order
    pub fn visible(&self) -> Vec<&Email> {
        filter_emails(&self.emails, &self.criteria)
    }

    pub fn visible_tree(&self) -> GroupTree<'_> {
        group_emails(filter_emails(&self.emails, &self.criteria))
    }

    pub fn visible_tree_in<Tz: TimeZone>(&self, tz: &Tz) -> GroupTree<'_> {
        group_emails_in(filter_emails(&self.emails, &self.criteria), tz)
    }

    /// Open an email, marking it read if needed
    ///
    /// Returns `None` for an unknown id. A failed read update still opens
    /// the email.
    pub fn select(&mut self, id: &EmailId) -> Option<&Email> {
        let email = self.find(id)?.clone();
        let unread = !email.is_read;
        self.selected = Some(email);

        if unread {
            self.update_status(id, StatusUpdate::read(true));
        }
        self.selected.as_ref()
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn toggle_star(&mut self, id: &EmailId) -> Option<Email> {
        let starred = self.find(id)?.is_starred;
        self.update_status(id, StatusUpdate::starred(!starred))
    }

    pub fn toggle_read(&mut self, id: &EmailId) -> Option<Email> {
        let read = self.find(id)?.is_read;
        self.update_status(id, StatusUpdate::read(!read))
    }

    /// Step the urgency override: absent -> 低 -> 中 -> 高 -> 低
    pub fn cycle_urgency(&mut self, id: &EmailId) -> Option<Email> {
        let current = resolve_urgency(self.find(id)?);
        self.set_urgency(id, Urgency::next_assigned(current))
    }

    pub fn set_urgency(&mut self, id: &EmailId, level: Urgency) -> Option<Email> {
        let result = self.backend.update_urgency(id, level);
        self.apply_result(result, "更新邮件紧急程度失败")
    }

    /// Swap an updated email into the collection and the selection
    pub fn apply_update(&mut self, email: Email) {
        if let Some(existing) = self.emails.iter_mut().find(|e| e.id == email.id) {
            *existing = email.clone();
        }
        if let Some(selected) = self.selected.as_mut().filter(|s| s.id == email.id) {
            *selected = email;
        }
    }

    fn update_status(&mut self, id: &EmailId, update: StatusUpdate) -> Option<Email> {
        let result = self.backend.update_status(id, &update);
        self.apply_result(result, "更新邮件状态失败")
    }

    fn apply_result(&mut self, result: Result<Email>, what: &str) -> Option<Email> {
        match result {
            Ok(email) => {
                self.apply_update(email.clone());
                Some(email)
            }
            Err(e) => {
                self.record_error(what, &e);
                None
            }
        }
    }

    fn record_error(&mut self, what: &str, e: &anyhow::Error) {
        error!("{}: {:#}", what, e);
        self.error = Some(format!("{what}: {e:#}"));
    }
}

impl SyncObserver for Mutex<Inbox> {
    fn reload_emails(&self) {
        self.lock().unwrap_or_else(PoisonError::into_inner).reload();
    }

    fn clear_selection(&self) {
        self.lock().unwrap_or_else(PoisonError::into_inner).clear_selection();
    }
}
