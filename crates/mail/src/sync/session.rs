//! Sync session state machine
//!
//! One session covers one sync run: `Idle -> Active -> Completed | Errored`.
//! Lines are fed in arrival order; each returns the side effects the
//! caller must carry out.

use log::{debug, info, warn};

/// Sentinel line ending a successful run
pub const SYNC_COMPLETE: &str = "SYNC_COMPLETE";
/// Prefix of a line reporting a fatal server-side error
pub const ERROR_PREFIX: &str = "ERROR:";
/// Logged in place of the completion sentinel
pub const COMPLETION_MARKER: &str = "--- 同步成功完成！---";
/// Logged when the stream drops without a terminal line
pub const CONNECTION_LOST_MARKER: &str = "--- 连接错误，同步中断 ---";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Active,
    Completed,
    Errored,
}

impl SyncStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncStatus::Completed | SyncStatus::Errored)
    }

    pub fn label(self) -> &'static str {
        match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Active => "active",
            SyncStatus::Completed => "completed",
            SyncStatus::Errored => "errored",
        }
    }
}

/// A stream line after classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent<'a> {
    Progress(&'a str),
    Error(&'a str),
    Complete,
}

impl<'a> SyncEvent<'a> {
    pub fn classify(line: &'a str) -> Self {
        if line.starts_with(ERROR_PREFIX) {
            SyncEvent::Error(line)
        } else if line.trim_end() == SYNC_COMPLETE {
            SyncEvent::Complete
        } else {
            SyncEvent::Progress(line)
        }
    }
}

/// Work the owner of a session must do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEffect {
    /// Stop reading and drop the stream connection
    CloseConnection,
    /// Replace the email collection from the backend
    ReloadEmails,
    /// Close whatever email is open
    ClearSelection,
    /// Hide the log after the display delay
    ScheduleDismiss,
}

#[derive(Debug, Clone, Default)]
pub struct SyncSession {
    status: SyncStatus,
    log: Vec<String>,
}

impl SyncSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    /// Enter `Active` with an empty log
    pub fn begin(&mut self) {
        self.status = SyncStatus::Active;
        self.log.clear();
    }

    /// Process one stream line
    ///
    /// Lines arriving outside an active session are ignored.
    pub fn handle_line(&mut self, line: &str) -> Vec<SyncEffect> {
        if self.status != SyncStatus::Active {
            debug!("Ignoring sync line in {} session: {:?}", self.status.label(), line);
            return Vec::new();
        }

        match SyncEvent::classify(line) {
            SyncEvent::Error(message) => {
                warn!("Sync failed: {}", message);
                self.log.push(message.to_string());
                self.status = SyncStatus::Errored;
                vec![SyncEffect::CloseConnection]
            }
            SyncEvent::Complete => {
                info!("Sync completed after {} lines", self.log.len());
                self.log.push(COMPLETION_MARKER.to_string());
                self.status = SyncStatus::Completed;
                vec![
                    SyncEffect::CloseConnection,
                    SyncEffect::ReloadEmails,
                    SyncEffect::ClearSelection,
                    SyncEffect::ScheduleDismiss,
                ]
            }
            SyncEvent::Progress(text) => {
                debug!("Sync: {}", text);
                self.log.push(text.to_string());
                Vec::new()
            }
        }
    }

    /// The stream ended or failed without a terminal line
    pub fn handle_disconnect(&mut self) -> Vec<SyncEffect> {
        if self.status != SyncStatus::Active {
            return Vec::new();
        }
        warn!("Sync stream dropped after {} lines", self.log.len());
        self.log.push(CONNECTION_LOST_MARKER.to_string());
        self.status = SyncStatus::Errored;
        vec![SyncEffect::CloseConnection]
    }
}
