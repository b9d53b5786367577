//! Email model as served by the mail-fetch backend

use serde::{Deserialize, Deserializer, Serialize};

use super::AnalysisPayload;

/// Unique identifier for an email record
///
/// The backend hands out integer row ids; they are kept opaque here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawEmailId")]
pub struct EmailId(pub String);

impl EmailId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EmailId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EmailId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EmailId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEmailId {
    Number(i64),
    Text(String),
}

impl From<RawEmailId> for EmailId {
    fn from(raw: RawEmailId) -> Self {
        match raw {
            RawEmailId::Number(n) => Self(n.to_string()),
            RawEmailId::Text(s) => Self(s),
        }
    }
}

/// An email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub email: String,
}

impl EmailAddress {
    /// Create a new email address with just the email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Create a new email address with a display name
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
        }
    }

    /// Parse an email address from a string like `"John Doe" <john@example.com>`
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        if let Some(angle_start) = s.find('<')
            && let Some(angle_end) = s.rfind('>')
            && angle_start < angle_end
        {
            let name = s[..angle_start].trim().trim_matches('"').trim();
            let email = s[angle_start + 1..angle_end].trim();
            return Self {
                name: if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                },
                email: email.to_string(),
            };
        }

        Self {
            name: None,
            email: s.to_string(),
        }
    }

    /// Format the email address for display
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// Partial status change sent with the update-status operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_starred: Option<bool>,
}

impl StatusUpdate {
    pub fn read(is_read: bool) -> Self {
        Self {
            is_read: Some(is_read),
            is_starred: None,
        }
    }

    pub fn starred(is_starred: bool) -> Self {
        Self {
            is_read: None,
            is_starred: Some(is_starred),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.is_read.is_none() && self.is_starred.is_none()
    }

    /// Apply the change to a local copy of an email
    pub fn apply(&self, email: &mut Email) {
        if let Some(is_read) = self.is_read {
            email.is_read = is_read;
        }
        if let Some(is_starred) = self.is_starred {
            email.is_starred = is_starred;
        }
    }
}

/// A single synced email with its analysis attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    pub id: EmailId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub from_email: String,
    /// Raw timestamp string; may be malformed
    #[serde(default, deserialize_with = "null_as_default")]
    pub received_date: String,
    #[serde(default, deserialize_with = "flag")]
    pub is_read: bool,
    #[serde(default, deserialize_with = "flag")]
    pub is_starred: bool,
    /// HTML body, rendered verbatim by the shell
    #[serde(default, deserialize_with = "null_as_default")]
    pub raw_email_body: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub analysis_markdown: String,
    #[serde(default)]
    pub analysis_json: AnalysisPayload,
    #[serde(default)]
    pub mailbox: Option<String>,
}

impl Email {
    /// Create a new email builder
    pub fn builder(id: impl Into<EmailId>) -> EmailBuilder {
        EmailBuilder::new(id.into())
    }

    /// Sender name, falling back to the address when no name is known
    pub fn sender_display(&self) -> &str {
        match self.from_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.from_email,
        }
    }
}

/// Builder for creating Email instances
pub struct EmailBuilder {
    email: Email,
}

impl EmailBuilder {
    fn new(id: EmailId) -> Self {
        Self {
            email: Email {
                id,
                subject: String::new(),
                from_name: None,
                from_email: String::new(),
                received_date: String::new(),
                is_read: false,
                is_starred: false,
                raw_email_body: String::new(),
                analysis_markdown: String::new(),
                analysis_json: AnalysisPayload::default(),
                mailbox: None,
            },
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.email.subject = subject.into();
        self
    }

    pub fn from(mut self, from: EmailAddress) -> Self {
        self.email.from_name = from.name;
        self.email.from_email = from.email;
        self
    }

    pub fn received_date(mut self, date: impl Into<String>) -> Self {
        self.email.received_date = date.into();
        self
    }

    pub fn read(mut self, is_read: bool) -> Self {
        self.email.is_read = is_read;
        self
    }

    pub fn starred(mut self, is_starred: bool) -> Self {
        self.email.is_starred = is_starred;
        self
    }

    pub fn body(mut self, html: impl Into<String>) -> Self {
        self.email.raw_email_body = html.into();
        self
    }

    pub fn analysis_markdown(mut self, markdown: impl Into<String>) -> Self {
        self.email.analysis_markdown = markdown.into();
        self
    }

    pub fn analysis(mut self, payload: AnalysisPayload) -> Self {
        self.email.analysis_json = payload;
        self
    }

    pub fn mailbox(mut self, mailbox: impl Into<String>) -> Self {
        self.email.mailbox = Some(mailbox.into());
        self
    }

    pub fn build(self) -> Email {
        self.email
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// SQLite hands booleans back as 0/1
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(n)) => n != 0,
        None => false,
    })
}
