//! HTTP client for the mail server's JSON API
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use std::collections::BTreeMap;
use std::io::BufReader;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use ureq::http::{Response, StatusCode};
use ureq::unversioned::resolver::DefaultResolver;
use ureq::unversioned::transport::{Connector, RustlsConnector};
use ureq::{Agent, Body};

use super::socket::{ClosableTcpConnector, SocketHandle};
use super::stream::EventStreamLines;
use super::traits::{MailBackend, Mailboxes, Settings, SyncStream};
use super::BackendError;
use crate::config::ClientConfig;
use crate::models::{Email, EmailId, StatusUpdate, Urgency};

/// Mail server client
pub struct HttpBackend {
    base_url: String,
    agent: Agent,
    /// Connect timeout for the sync stream, which has no global timeout
    /// since a run may stream for minutes
    stream_timeout: Duration,
}

impl HttpBackend {
    /// Create a client for `base_url` (e.g. `http://localhost:5001/api`)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = Agent::new_with_config(
            Agent::config_builder()
                .timeout_global(Some(timeout))
                .http_status_as_error(false)
                .build(),
        );
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
            stream_timeout: timeout,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn email_url(&self, id: &EmailId, action: &str) -> String {
        self.url(&format!("/emails/{}/{}", urlencoding::encode(id.as_str()), action))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(BackendError::Transport)
            .with_context(|| format!("Failed to send GET {path}"))?;
        read_json(check_status(response, path)?, path)
    }

    fn put_json<T: DeserializeOwned>(&self, url: &str, body: &Value, what: &str) -> Result<T> {
        debug!("PUT {}", url);
        let response = self
            .agent
            .put(url)
            .send_json(body)
            .map_err(BackendError::Transport)
            .with_context(|| format!("Failed to send {what} request"))?;
        read_json(check_status(response, what)?, what)
    }
}

/// Pass successful responses through, turn the rest into [`BackendError`]
fn check_status(mut response: Response<Body>, what: &str) -> Result<Response<Body>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.body_mut().read_to_string().unwrap_or_default();
    let err = if status == StatusCode::NOT_FOUND {
        BackendError::NotFound(what.to_string())
    } else {
        BackendError::status(status.as_u16(), &body)
    };
    Err(err.into())
}

fn read_json<T: DeserializeOwned>(mut response: Response<Body>, what: &str) -> Result<T> {
    response
        .body_mut()
        .read_json()
        .map_err(|e| BackendError::Decode(e.to_string()))
        .with_context(|| format!("Failed to parse {what} response"))
}

impl MailBackend for HttpBackend {
    fn list_emails(&self) -> Result<Vec<Email>> {
        let emails: Vec<Email> = self.get_json("/emails")?;
        info!("Loaded {} emails", emails.len());
        Ok(emails)
    }

    fn update_status(&self, id: &EmailId, update: &StatusUpdate) -> Result<Email> {
        let body = serde_json::to_value(update).context("Failed to encode status update")?;
        self.put_json(&self.email_url(id, "status"), &body, "update status")
    }

    fn update_urgency(&self, id: &EmailId, level: Urgency) -> Result<Email> {
        let body = json!({ "urgency": level.as_str() });
        self.put_json(&self.email_url(id, "urgency"), &body, "update urgency")
    }

    fn list_settings(&self) -> Result<Settings> {
        // Unset keys come back as null
        let raw: BTreeMap<String, Option<String>> = self.get_json("/settings")?;
        Ok(raw
            .into_iter()
            .map(|(key, value)| (key, value.unwrap_or_default()))
            .collect())
    }

    fn list_mailboxes(&self) -> Result<Mailboxes> {
        self.get_json("/mailboxes")
    }

    fn save_settings(&self, settings: &Settings) -> Result<String> {
        let url = self.url("/settings");
        debug!("POST {}", url);
        let response = self
            .agent
            .post(&url)
            .send_json(settings)
            .map_err(BackendError::Transport)
            .context("Failed to send save settings request")?;
        let reply: Value = read_json(check_status(response, "save settings")?, "save settings")?;

        Ok(reply
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    fn search(&self, query: &str) -> Result<Vec<Email>> {
        self.get_json(&format!("/search?query={}", urlencoding::encode(query)))
    }

    fn open_sync_stream(&self) -> Result<SyncStream> {
        let url = self.url("/sync-emails");
        info!("Opening sync stream {}", url);

        // A fresh agent per run so the socket can be shut while a read blocks
        let socket = SocketHandle::default();
        let config = Agent::config_builder()
            .timeout_connect(Some(self.stream_timeout))
            .http_status_as_error(false)
            .build();
        let connector = ClosableTcpConnector::new(socket.clone()).chain(RustlsConnector::default());
        let agent = Agent::with_parts(config, connector, DefaultResolver::default());

        let response = agent
            .get(&url)
            .header("Accept", "text/event-stream")
            .call()
            .map_err(BackendError::Transport)
            .context("Failed to open sync stream")?;
        let response = check_status(response, "sync stream")?;

        let reader = BufReader::new(response.into_body().into_reader());
        Ok(SyncStream::new(Box::new(EventStreamLines::new(reader))).with_closer(move || socket.shutdown()))
    }
}
