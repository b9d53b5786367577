//! Domain models for mail entities

mod analysis;
mod email;
mod urgency;

pub use analysis::{AnalysisEntry, AnalysisPayload};
pub use email::{Email, EmailAddress, EmailBuilder, EmailId, StatusUpdate};
pub use urgency::{ParseUrgencyError, Urgency};
