//! Debounced search driver
//!
//! Each input change cancels the pending debounce task and starts a new
//! one: sleep for the quiet period, then run the lookup on a blocking
//! thread and hand the outcome to the [`SearchSession`], which drops it if
//! newer input arrived meanwhile. State changes are published on a
//! `watch` channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::query_parser::SearchScope;
use super::session::{SearchSession, SearchState, SearchTicket};
use crate::backend::MailBackend;
use crate::config::ClientConfig;
use crate::models::Email;

/// Search box controller
///
/// Methods that change the query spawn onto the current Tokio runtime.
pub struct SearchController {
    backend: Arc<dyn MailBackend>,
    session: Arc<Mutex<SearchSession>>,
    state_tx: watch::Sender<SearchState>,
    debounce_task: Mutex<Option<JoinHandle<()>>>,
    debounce: Duration,
    limit: Option<usize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SearchController {
    pub fn new(backend: Arc<dyn MailBackend>, debounce: Duration) -> Self {
        let (state_tx, _) = watch::channel(SearchState::Idle);
        Self {
            backend,
            session: Arc::new(Mutex::new(SearchSession::new())),
            state_tx,
            debounce_task: Mutex::new(None),
            debounce,
            limit: None,
        }
    }

    pub fn from_config(backend: Arc<dyn MailBackend>, config: &ClientConfig) -> Self {
        Self::new(backend, config.search_debounce()).with_limit(config.search_limit)
    }

    /// Cap the number of results kept from each lookup
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> SearchState {
        self.state_tx.borrow().clone()
    }

    pub fn input(&self) -> String {
        lock(&self.session).input().to_string()
    }

    pub fn highlight_term(&self) -> Option<String> {
        lock(&self.session).highlight_term().map(str::to_string)
    }

    /// Handle a change of the search box text
    pub fn set_query(&self, raw: &str) {
        self.update_input(raw, self.debounce);
    }

    /// Put a suggested prefix into the search box
    ///
    /// `/starred` needs no term and is looked up right away.
    pub fn select_suggestion(&self, scope: SearchScope) -> String {
        let query = scope.prefix().to_string();
        let delay = if scope.takes_term() { self.debounce } else { Duration::ZERO };
        self.update_input(&query, delay);
        query
    }

    pub fn clear(&self) {
        self.update_input("", Duration::ZERO);
    }

    /// Swap an updated email into the visible results
    pub fn apply_update(&self, email: &Email) {
        let mut session = lock(&self.session);
        if session.apply_update(email) {
            self.state_tx.send_replace(session.state().clone());
        }
    }

    fn update_input(&self, raw: &str, delay: Duration) {
        let ticket = {
            let mut session = lock(&self.session);
            let ticket = session.set_input(raw);
            self.state_tx.send_replace(session.state().clone());
            ticket
        };

        let mut debounce_task = lock(&self.debounce_task);
        if let Some(task) = debounce_task.take() {
            task.abort();
        }

        if let Some(ticket) = ticket {
            let lookup = Lookup {
                backend: self.backend.clone(),
                session: self.session.clone(),
                state_tx: self.state_tx.clone(),
                limit: self.limit,
            };
            *debounce_task = Some(tokio::spawn(lookup.run(ticket, delay)));
        }
    }
}

impl Drop for SearchController {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.debounce_task).take() {
            task.abort();
        }
    }
}

/// Everything a debounce task needs, detached from the controller
struct Lookup {
    backend: Arc<dyn MailBackend>,
    session: Arc<Mutex<SearchSession>>,
    state_tx: watch::Sender<SearchState>,
    limit: Option<usize>,
}

impl Lookup {
    async fn run(self, ticket: SearchTicket, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        {
            let mut session = lock(&self.session);
            if !session.start(&ticket) {
                return;
            }
            self.state_tx.send_replace(session.state().clone());
        }

        let backend = self.backend.clone();
        let query = ticket.query().to_string();
        let result = tokio::task::spawn_blocking(move || backend.search(&query)).await;

        let outcome = match result {
            Ok(Ok(mut results)) => {
                info!("Search {:?} returned {} results", ticket.query(), results.len());
                if let Some(limit) = self.limit {
                    results.truncate(limit);
                }
                Ok(results)
            }
            Ok(Err(e)) => {
                error!("Search failed: {:#}", e);
                Err(format!("搜索失败: {e:#}"))
            }
            Err(e) => {
                error!("Search task failed: {}", e);
                Err(format!("搜索失败: {e}"))
            }
        };

        let mut session = lock(&self.session);
        if session.resolve(&ticket, outcome) {
            self.state_tx.send_replace(session.state().clone());
        } else {
            debug!("Discarding stale results for {:?}", ticket.query());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;

    fn controller(debounce_ms: u64) -> (SearchController, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::with_emails(vec![
            Email::builder("1").subject("Invoice March").build(),
            Email::builder("2").subject("Lunch").starred(true).build(),
            Email::builder("3").subject("Invoice April").build(),
        ]));
        let controller = SearchController::new(backend.clone(), Duration::from_millis(debounce_ms));
        (controller, backend)
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_waits_for_quiet_period() {
        let (controller, _) = controller(1000);
        let mut rx = controller.subscribe();

        controller.set_query("invoice");
        assert_eq!(controller.state(), SearchState::Pending { query: "invoice".into() });

        let state = rx
            .wait_for(|s| matches!(s, SearchState::Ready { .. }))
            .await
            .unwrap()
            .clone();
        assert_eq!(state.results().len(), 2);
        assert_eq!(controller.highlight_term().as_deref(), Some("invoice"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_starred_suggestion_runs_immediately() {
        let (controller, _) = controller(60_000);
        let mut rx = controller.subscribe();

        assert_eq!(controller.select_suggestion(SearchScope::Starred), "/starred");
        let state = rx
            .wait_for(|s| matches!(s, SearchState::Ready { .. }))
            .await
            .unwrap()
            .clone();
        assert_eq!(state.results()[0].id.as_str(), "2");
        assert_eq!(controller.highlight_term(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_term_suggestion_waits_for_term() {
        let (controller, _) = controller(10);
        assert_eq!(controller.select_suggestion(SearchScope::From), "/from:");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(controller.state(), SearchState::Suggesting(vec![SearchScope::From]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_truncates_results() {
        let (controller, _) = controller(10);
        let controller = controller.with_limit(Some(1));
        let mut rx = controller.subscribe();

        controller.set_query("invoice");
        let state = rx
            .wait_for(|s| matches!(s, SearchState::Ready { .. }))
            .await
            .unwrap()
            .clone();
        assert_eq!(state.results().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_pending_lookup() {
        let (controller, _) = controller(1000);
        controller.set_query("invoice");
        controller.clear();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(controller.state(), SearchState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_update_refreshes_results() {
        let (controller, _) = controller(10);
        let mut rx = controller.subscribe();
        controller.set_query("lunch");
        rx.wait_for(|s| matches!(s, SearchState::Ready { .. })).await.unwrap();

        let updated = Email::builder("2").subject("Lunch").starred(false).read(true).build();
        controller.apply_update(&updated);
        assert!(controller.state().results()[0].is_read);
    }
}
