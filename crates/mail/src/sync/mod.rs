//! Live sync sessions
//!
//! A sync run streams progress lines from the backend until an `ERROR:`
//! line, the `SYNC_COMPLETE` sentinel, or a dropped connection ends it.

mod runner;
mod session;

pub use runner::{SyncObserver, SyncRunner, SyncSnapshot};
pub use session::{
    COMPLETION_MARKER, CONNECTION_LOST_MARKER, ERROR_PREFIX, SYNC_COMPLETE, SyncEffect, SyncEvent, SyncSession,
    SyncStatus,
};
