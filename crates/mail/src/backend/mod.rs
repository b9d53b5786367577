//! Backend collaborators
//!
//! The engine talks to the mail fetch/analysis server through
//! [`MailBackend`]. [`HttpBackend`] speaks its JSON API over HTTP;
//! [`InMemoryBackend`] serves fixtures and tests.

mod client;
mod error;
mod memory;
mod socket;
mod stream;
mod traits;

pub use client::HttpBackend;
pub use error::BackendError;
pub use memory::InMemoryBackend;
pub use stream::EventStreamLines;
pub use traits::{MailBackend, Mailboxes, Settings, StreamCloser, SyncLines, SyncStream};
