//! Drives sync sessions against the backend's event stream
//!
//! A blocking producer reads the stream and forwards lines through an
//! mpsc channel; a single consumer task feeds them to the
//! [`SyncSession`] in order and carries out the resulting effects.
//! Snapshots of the session are published on a `watch` channel.
//!
//! Starting a run closes the previous run's stream, and the new stream
//! only opens once the old one is gone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::session::{SyncEffect, SyncSession, SyncStatus};
use crate::backend::{MailBackend, StreamCloser};
use crate::config::ClientConfig;

/// Lines buffered between the stream reader and the session
const CHANNEL_CAPACITY: usize = 64;

/// Application hooks run when a sync completes
///
/// Called from a blocking thread.
pub trait SyncObserver: Send + Sync {
    /// Replace the email collection from the backend
    fn reload_emails(&self);

    /// Close the open email
    fn clear_selection(&self);
}

/// What the sync log view shows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncSnapshot {
    /// Sequence number of the run this snapshot belongs to
    pub run: u64,
    pub status: SyncStatus,
    pub log: Vec<String>,
    /// Whether the log is on screen
    pub visible: bool,
}

enum StreamItem {
    Line(String),
    /// Stream ended or failed; carries the failure if there was one
    Ended(Option<String>),
}

/// The stream connection of one run, shared by its producer, its
/// consumer and the runner
#[derive(Default)]
struct Connection {
    state: Mutex<ConnectionState>,
}

#[derive(Default)]
struct ConnectionState {
    closed: bool,
    closer: Option<StreamCloser>,
}

impl Connection {
    /// Take over the closer of a freshly opened stream
    ///
    /// Returns false, closing the stream at once, if the run was closed
    /// while the stream was opening.
    fn attach(&self, closer: Option<StreamCloser>) -> bool {
        let mut state = lock(&self.state);
        if state.closed {
            if let Some(close) = closer {
                close();
            }
            return false;
        }
        state.closer = closer;
        true
    }

    /// Close the stream; a read blocked on it returns
    fn close(&self) {
        let mut state = lock(&self.state);
        state.closed = true;
        if let Some(close) = state.closer.take() {
            close();
        }
    }

    fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

struct ActiveRun {
    connection: Arc<Connection>,
    consumer: JoinHandle<()>,
    /// Resolves once the producer has dropped its stream
    producer_exit: oneshot::Receiver<()>,
}

impl ActiveRun {
    /// Close the stream and stop the consumer; the returned receiver
    /// resolves when the old stream is gone
    fn teardown(self) -> oneshot::Receiver<()> {
        self.connection.close();
        self.consumer.abort();
        self.producer_exit
    }
}

pub struct SyncRunner {
    backend: Arc<dyn MailBackend>,
    observer: Arc<dyn SyncObserver>,
    dismiss_after: Duration,
    snapshot_tx: watch::Sender<SyncSnapshot>,
    current_run: Arc<AtomicU64>,
    active: Mutex<Option<ActiveRun>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncRunner {
    pub fn new(backend: Arc<dyn MailBackend>, observer: Arc<dyn SyncObserver>, dismiss_after: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(SyncSnapshot::default());
        Self {
            backend,
            observer,
            dismiss_after,
            snapshot_tx,
            current_run: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        }
    }

    pub fn from_config(
        backend: Arc<dyn MailBackend>,
        observer: Arc<dyn SyncObserver>,
        config: &ClientConfig,
    ) -> Self {
        Self::new(backend, observer, config.sync_dismiss())
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Start a new sync run, tearing down any run still in progress
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> u64 {
        let mut active = lock(&self.active);
        let previous_exit = active.take().map(|previous| {
            info!("Tearing down previous sync run");
            previous.teardown()
        });

        let run = self.current_run.fetch_add(1, Ordering::SeqCst) + 1;
        let mut session = SyncSession::new();
        session.begin();
        self.snapshot_tx.send_replace(SyncSnapshot {
            run,
            status: session.status(),
            log: Vec::new(),
            visible: true,
        });
        info!("Starting sync run {}", run);

        let connection = Arc::new(Connection::default());
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (exit_tx, producer_exit) = oneshot::channel();

        let backend = self.backend.clone();
        let producer_connection = connection.clone();
        tokio::task::spawn_blocking(move || {
            let _exit = exit_tx;
            if let Some(previous_exit) = previous_exit {
                // The old stream must be closed before a new one opens
                let _ = previous_exit.blocking_recv();
                debug!("Previous sync stream closed");
            }
            produce(backend.as_ref(), &tx, &producer_connection);
        });

        let consumer = Consumer {
            run,
            session,
            observer: self.observer.clone(),
            dismiss_after: self.dismiss_after,
            snapshot_tx: self.snapshot_tx.clone(),
            current_run: self.current_run.clone(),
            connection: connection.clone(),
        };
        *active = Some(ActiveRun {
            connection,
            consumer: tokio::spawn(consumer.run(rx)),
            producer_exit,
        });

        run
    }

    /// Hide the log; a run in progress keeps going
    pub fn close(&self) {
        self.snapshot_tx.send_if_modified(|snapshot| {
            let changed = snapshot.visible;
            snapshot.visible = false;
            changed
        });
    }

    /// Stop the current run, if any, and hide the log
    pub fn shutdown(&self) {
        if let Some(run) = lock(&self.active).take() {
            let _ = run.teardown();
        }
        self.current_run.fetch_add(1, Ordering::SeqCst);
        self.close();
    }

    /// Wait until the latest run reaches a terminal state
    pub async fn finished(&self) -> SyncSnapshot {
        let mut rx = self.subscribe();
        match rx.wait_for(|snapshot| snapshot.status.is_terminal()).await {
            Ok(snapshot) => snapshot.clone(),
            // Unreachable while self holds the sender
            Err(_) => self.snapshot(),
        }
    }
}

impl Drop for SyncRunner {
    fn drop(&mut self) {
        if let Some(run) = lock(&self.active).take() {
            let _ = run.teardown();
        }
    }
}

/// Read the stream on a blocking thread until it ends, fails or the run
/// is closed; dropping the line iterator releases the connection
fn produce(backend: &dyn MailBackend, tx: &mpsc::Sender<StreamItem>, connection: &Connection) {
    if connection.is_closed() {
        debug!("Sync run closed before its stream opened");
        return;
    }
    let (lines, closer) = match backend.open_sync_stream() {
        Ok(stream) => stream.into_parts(),
        Err(e) => {
            error!("Failed to open sync stream: {:#}", e);
            let _ = tx.blocking_send(StreamItem::Ended(Some(format!("{e:#}"))));
            return;
        }
    };
    if !connection.attach(closer) {
        debug!("Sync run closed while its stream was opening");
        return;
    }

    for item in lines {
        if connection.is_closed() {
            debug!("Sync run closed, dropping stream");
            return;
        }
        match item {
            Ok(line) => {
                if tx.blocking_send(StreamItem::Line(line)).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.blocking_send(StreamItem::Ended(Some(format!("{e:#}"))));
                return;
            }
        }
    }

    let _ = tx.blocking_send(StreamItem::Ended(None));
}

struct Consumer {
    run: u64,
    session: SyncSession,
    observer: Arc<dyn SyncObserver>,
    dismiss_after: Duration,
    snapshot_tx: watch::Sender<SyncSnapshot>,
    current_run: Arc<AtomicU64>,
    connection: Arc<Connection>,
}

impl Consumer {
    async fn run(mut self, mut rx: mpsc::Receiver<StreamItem>) {
        while let Some(item) = rx.recv().await {
            let effects = match item {
                StreamItem::Line(line) => self.session.handle_line(&line),
                StreamItem::Ended(reason) => {
                    if let Some(reason) = reason {
                        warn!("Sync stream failed: {}", reason);
                    }
                    self.session.handle_disconnect()
                }
            };
            self.publish(true);

            for effect in effects {
                self.apply(effect).await;
            }
            if self.session.status().is_terminal() {
                break;
            }
        }

        // Producer went away without a final item
        if !self.session.status().is_terminal() {
            self.session.handle_disconnect();
            self.connection.close();
            self.publish(true);
        }
    }

    async fn apply(&self, effect: SyncEffect) {
        match effect {
            SyncEffect::CloseConnection => self.connection.close(),
            SyncEffect::ReloadEmails => {
                let observer = self.observer.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || observer.reload_emails()).await {
                    error!("Email reload task failed: {}", e);
                }
            }
            SyncEffect::ClearSelection => {
                let observer = self.observer.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || observer.clear_selection()).await {
                    error!("Clear selection task failed: {}", e);
                }
            }
            SyncEffect::ScheduleDismiss => {
                tokio::time::sleep(self.dismiss_after).await;
                self.publish(false);
            }
        }
    }

    /// Publish unless a newer run has started
    fn publish(&self, visible: bool) {
        let run = self.run;
        let current_run = &self.current_run;
        let session = &self.session;
        self.snapshot_tx.send_if_modified(|snapshot| {
            if current_run.load(Ordering::SeqCst) != run {
                return false;
            }
            // A closed log stays closed
            let visible = visible && (snapshot.run != run || snapshot.visible);
            *snapshot = SyncSnapshot {
                run,
                status: session.status(),
                log: session.log().to_vec(),
                visible,
            };
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{InMemoryBackend, Mailboxes, Settings, SyncStream};
    use crate::models::{Email, EmailId, StatusUpdate, Urgency};
    use anyhow::{Result, bail};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc as std_mpsc;

    #[derive(Default)]
    struct Counts {
        reloads: AtomicUsize,
        clears: AtomicUsize,
    }

    impl SyncObserver for Counts {
        fn reload_emails(&self) {
            self.reloads.fetch_add(1, Ordering::SeqCst);
        }

        fn clear_selection(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn runner(lines: &[&str], dismiss_ms: u64) -> (SyncRunner, Arc<Counts>, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new());
        backend.set_sync_script(lines.iter().copied());
        let counts = Arc::new(Counts::default());
        let runner = SyncRunner::new(backend.clone(), counts.clone(), Duration::from_millis(dismiss_ms));
        (runner, counts, backend)
    }

    /// Streams that stay open, sending one line, until their closer runs
    #[derive(Default)]
    struct HeldOpen {
        opened: AtomicUsize,
        closed: Arc<AtomicUsize>,
        /// Streams already closed at each open
        closed_at_open: Mutex<Vec<usize>>,
    }

    struct HeldLines {
        rx: std_mpsc::Receiver<String>,
        closed: Arc<AtomicUsize>,
    }

    impl Iterator for HeldLines {
        type Item = Result<String>;

        fn next(&mut self) -> Option<Self::Item> {
            self.rx.recv().ok().map(Ok)
        }
    }

    impl Drop for HeldLines {
        fn drop(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl MailBackend for HeldOpen {
        fn list_emails(&self) -> Result<Vec<Email>> {
            bail!("not served")
        }
        fn update_status(&self, _: &EmailId, _: &StatusUpdate) -> Result<Email> {
            bail!("not served")
        }
        fn update_urgency(&self, _: &EmailId, _: Urgency) -> Result<Email> {
            bail!("not served")
        }
        fn list_settings(&self) -> Result<Settings> {
            bail!("not served")
        }
        fn list_mailboxes(&self) -> Result<Mailboxes> {
            bail!("not served")
        }
        fn save_settings(&self, _: &Settings) -> Result<String> {
            bail!("not served")
        }
        fn search(&self, _: &str) -> Result<Vec<Email>> {
            bail!("not served")
        }
        fn open_sync_stream(&self) -> Result<SyncStream> {
            lock(&self.closed_at_open).push(self.closed.load(Ordering::SeqCst));
            let n = self.opened.fetch_add(1, Ordering::SeqCst) + 1;

            let (tx, rx) = std_mpsc::channel();
            let _ = tx.send(format!("stream {n} open"));
            let sender = Mutex::new(Some(tx));
            let lines = HeldLines {
                rx,
                closed: self.closed.clone(),
            };
            Ok(SyncStream::new(Box::new(lines)).with_closer(move || {
                lock(&sender).take();
            }))
        }
    }

    #[test]
    fn test_finished_waits_for_a_terminal_state() {
        let (runner, _, _) = runner(&[], 10);
        let mut finished = tokio_test::task::spawn(runner.finished());
        tokio_test::assert_pending!(finished.poll());
    }

    #[tokio::test]
    async fn test_stream_without_terminal_line_is_connection_loss() {
        let (runner, counts, _) = runner(&["Connecting..."], 10);
        runner.start();
        let snapshot = runner.finished().await;

        assert_eq!(snapshot.status, SyncStatus::Errored);
        assert_eq!(snapshot.log, vec!["Connecting...", crate::sync::CONNECTION_LOST_MARKER]);
        assert!(snapshot.visible);
        assert_eq!(counts.reloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_open_failure_is_connection_loss() {
        let (runner, _, backend) = runner(&[], 10);
        backend.set_sync_failure(Some("refused".to_string()));
        runner.start();
        let snapshot = runner.finished().await;
        assert_eq!(snapshot.status, SyncStatus::Errored);
        assert_eq!(snapshot.log.len(), 1);
    }

    #[tokio::test]
    async fn test_close_hides_log_only() {
        let (runner, _, _) = runner(&["ERROR: bad password"], 10);
        runner.start();
        let snapshot = runner.finished().await;
        assert!(snapshot.visible);

        runner.close();
        let closed = runner.snapshot();
        assert!(!closed.visible);
        assert_eq!(closed.status, SyncStatus::Errored);
        assert_eq!(closed.log, vec!["ERROR: bad password"]);
    }

    #[tokio::test]
    async fn test_restart_resets_log() {
        let (runner, _, backend) = runner(&["ERROR: first"], 10);
        let first = runner.start();
        runner.finished().await;

        backend.set_sync_script(["second run", "ERROR: second"]);
        let second = runner.start();
        assert!(second > first);
        let snapshot = runner.finished().await;
        assert_eq!(snapshot.run, second);
        assert_eq!(snapshot.log, vec!["second run", "ERROR: second"]);
    }

    #[tokio::test]
    async fn test_restart_closes_the_open_stream_first() {
        let backend = Arc::new(HeldOpen::default());
        let runner = SyncRunner::new(backend.clone(), Arc::new(Counts::default()), Duration::from_millis(10));
        let mut rx = runner.subscribe();

        let first = runner.start();
        assert!(rx.wait_for(|s| s.run == first && s.log == ["stream 1 open"]).await.is_ok());
        assert_eq!(backend.closed.load(Ordering::SeqCst), 0);

        // The first run is still streaming when the second starts
        let second = runner.start();
        assert!(rx.wait_for(|s| s.run == second && s.log == ["stream 2 open"]).await.is_ok());

        assert_eq!(backend.opened.load(Ordering::SeqCst), 2);
        assert_eq!(*lock(&backend.closed_at_open), vec![0, 1]);
        assert_eq!(runner.snapshot().status, SyncStatus::Active);

        runner.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_hides_and_detaches() {
        let (runner, _, _) = runner(&["ERROR: x"], 10);
        runner.start();
        runner.finished().await;
        runner.shutdown();
        assert!(!runner.snapshot().visible);
    }
}
