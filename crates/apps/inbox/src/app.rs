//! Command dispatch
//!
//! Wires the CLI to the mail engine: one [`App`] per invocation holds the
//! resolved config and backend.

use anyhow::{Context, Result, anyhow, bail};
use log::{info, warn};
use mail::{
    ClientConfig, EmailId, FilterCriteria, HttpBackend, InMemoryBackend, Inbox, MailBackend, SearchController,
    SearchState, Settings, SyncRunner, SyncStatus,
};
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::cli::{Cli, Commands};
use crate::expansion::{Expansion, children};
use crate::render;

pub struct App {
    config: ClientConfig,
    backend: Arc<dyn MailBackend>,
}

impl App {
    /// Resolve config and backend from the command line
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::load()?,
        };
        if let Some(url) = &cli.api_url {
            config.base_url = url.clone();
        }

        let backend: Arc<dyn MailBackend> = match &cli.fixture {
            Some(path) => {
                info!("Serving fixture {}", path.display());
                Arc::new(InMemoryBackend::from_fixture(path)?)
            }
            None => {
                info!("Using server at {}", config.base_url);
                Arc::new(HttpBackend::from_config(&config))
            }
        };
        Ok(Self::new(config, backend))
    }

    pub fn new(config: ClientConfig, backend: Arc<dyn MailBackend>) -> Self {
        Self { config, backend }
    }

    pub async fn run<W: Write>(&self, command: Commands, out: &mut W) -> Result<()> {
        match command {
            Commands::List {
                urgency,
                read,
                starred,
                depth,
                toggle,
                toggle_children,
                highlight,
            } => {
                let criteria = FilterCriteria::new(urgency, read, starred);
                let text = self
                    .with_inbox(move |inbox| {
                        inbox.set_criteria(criteria);
                        let tree = inbox.visible_tree();
                        let mut expansion = Expansion::initial(&tree);
                        expansion.expand_to_depth(&tree, depth);
                        for path in toggle {
                            expansion.toggle(path);
                        }
                        for path in toggle_children {
                            expansion.toggle_children(&children(&tree, path));
                        }

                        let mut text = format!("收件箱 ({criteria})\n");
                        text.push_str(&render::render_tree(&tree, &expansion, highlight.as_deref()));
                        Ok(text)
                    })
                    .await?;
                out.write_all(text.as_bytes())?;
            }

            Commands::Show { id, highlight } => {
                let text = self
                    .with_inbox(move |inbox| {
                        let id = EmailId::new(id);
                        let email = inbox.select(&id).cloned().ok_or_else(|| not_found(&id))?;
                        if let Some(e) = inbox.error() {
                            warn!("{}", e);
                        }
                        Ok(render::render_email(&email, highlight.as_deref()))
                    })
                    .await?;
                out.write_all(text.as_bytes())?;
            }

            Commands::Star { id } => {
                let row = self.update(id, |inbox, id| inbox.toggle_star(id)).await?;
                writeln!(out, "{row}")?;
            }

            Commands::Read { id } => {
                let row = self.update(id, |inbox, id| inbox.toggle_read(id)).await?;
                writeln!(out, "{row}")?;
            }

            Commands::Urgency { id, level } => {
                let row = self
                    .update(id, move |inbox, id| match level {
                        Some(level) => inbox.set_urgency(id, level),
                        None => inbox.cycle_urgency(id),
                    })
                    .await?;
                writeln!(out, "{row}")?;
            }

            Commands::Search { query, now } => self.search(&query, now, out).await?,

            Commands::Sync => self.sync(out).await?,

            Commands::Settings { set } => {
                let backend = self.backend.clone();
                let text = blocking(move || {
                    let mut text = String::new();
                    if !set.is_empty() {
                        let mut settings = backend.list_settings().context("获取设置失败")?;
                        for (key, value) in set {
                            if !settings.contains_key(&key) {
                                bail!("Unknown setting: {key}");
                            }
                            settings.insert(key, value);
                        }
                        let message = backend.save_settings(&settings).context("保存设置失败")?;
                        text.push_str(&message);
                        text.push('\n');
                    }
                    let settings: Settings = backend.list_settings().context("获取设置失败")?;
                    text.push_str(&render::render_settings(&settings));
                    Ok(text)
                })
                .await?;
                out.write_all(text.as_bytes())?;
            }

            Commands::Mailboxes => {
                let backend = self.backend.clone();
                let mailboxes = blocking(move || backend.list_mailboxes().context("获取邮箱列表失败")).await?;
                out.write_all(render::render_mailboxes(&mailboxes).as_bytes())?;
            }
        }
        Ok(())
    }

    /// Load the inbox on a blocking thread and run `f` against it
    async fn with_inbox<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Inbox) -> Result<T> + Send + 'static,
    {
        let backend = self.backend.clone();
        blocking(move || {
            let mut inbox = Inbox::new(backend);
            if !inbox.reload() {
                return Err(inbox_error(&inbox));
            }
            f(&mut inbox)
        })
        .await
    }

    /// Apply a per-email update and render the updated row
    async fn update<F>(&self, id: String, f: F) -> Result<String>
    where
        F: FnOnce(&mut Inbox, &EmailId) -> Option<mail::Email> + Send + 'static,
    {
        self.with_inbox(move |inbox| {
            let id = EmailId::new(id);
            if inbox.find(&id).is_none() {
                return Err(not_found(&id));
            }
            let email = f(inbox, &id).ok_or_else(|| inbox_error(inbox))?;
            Ok(render::email_row(&email, None))
        })
        .await
    }

    async fn search<W: Write>(&self, query: &str, now: bool, out: &mut W) -> Result<()> {
        let controller = if now {
            SearchController::new(self.backend.clone(), Duration::ZERO).with_limit(self.config.search_limit)
        } else {
            SearchController::from_config(self.backend.clone(), &self.config)
        };
        let mut rx = controller.subscribe();
        controller.set_query(query);

        let state = rx
            .wait_for(|state| !state.is_busy())
            .await
            .map(|state| state.clone())
            .context("Search controller went away")?;
        if let SearchState::Failed { message, .. } = &state {
            bail!("{message}");
        }

        let term = controller.highlight_term();
        out.write_all(render::render_search(&state, term.as_deref()).as_bytes())?;
        Ok(())
    }

    async fn sync<W: Write>(&self, out: &mut W) -> Result<()> {
        let inbox = Arc::new(Mutex::new(Inbox::new(self.backend.clone())));
        let runner = SyncRunner::from_config(self.backend.clone(), inbox.clone(), &self.config);
        let mut rx = runner.subscribe();
        runner.start();

        let mut seen = 0;
        let status = loop {
            let snapshot = rx.borrow_and_update().clone();
            out.write_all(render::render_sync_progress(&snapshot.log, seen, snapshot.status).as_bytes())?;
            out.flush()?;
            seen = snapshot.log.len();

            if snapshot.status.is_terminal() {
                break snapshot.status;
            }
            if rx.changed().await.is_err() {
                break runner.snapshot().status;
            }
        };

        if status != SyncStatus::Completed {
            bail!("同步未完成");
        }

        // The log is dismissed once the reload has run
        rx.wait_for(|snapshot| !snapshot.visible)
            .await
            .context("Sync runner went away")?;
        let inbox = inbox.lock().unwrap_or_else(PoisonError::into_inner);
        match inbox.error() {
            Some(e) => warn!("{}", e),
            None => writeln!(out, "已加载 {} 封邮件", inbox.emails().len())?,
        }
        Ok(())
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.context("Background task failed")?
}

fn inbox_error(inbox: &Inbox) -> anyhow::Error {
    anyhow!("{}", inbox.error().unwrap_or("操作失败"))
}

fn not_found(id: &EmailId) -> anyhow::Error {
    anyhow!("Email {id} not found")
}
