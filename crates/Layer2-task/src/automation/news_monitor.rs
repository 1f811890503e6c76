//! News monitor - periodic HTTP content watcher with keyword match

use super::{Automation, ConfigField, RunContext};
use async_trait::async_trait;
use hub_foundation::{Error, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::{debug, info, warn};

const DEFAULT_CHECK_INTERVAL_SECS: u64 = 600;

/// Where change notifications are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationMethod {
    Console,
    Email,
    Push,
}

impl NotificationMethod {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "email" => Ok(Self::Email),
            "push" => Ok(Self::Push),
            other => Err(Error::InvalidInput(format!(
                "Unknown notification method '{}'",
                other
            ))),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Console => "NOTIFICATION",
            Self::Email => "EMAIL NOTIFICATION",
            Self::Push => "PUSH NOTIFICATION",
        }
    }
}

/// Outcome of feeding a fetched page to [`ContentTracker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentChange {
    /// First capture, nothing to compare against
    Initial,
    Unchanged,
    /// Content changed; carries the message to notify, if any
    Changed(Option<String>),
}

/// Remembers the last page fingerprint and decides what to notify
#[derive(Debug, Clone, Default)]
pub struct ContentTracker {
    keywords: Vec<String>,
    last_fingerprint: Option<u64>,
}

impl ContentTracker {
    /// `keywords` is the raw comma-separated config value
    pub fn new(keywords: &str) -> Self {
        Self {
            keywords: keywords
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect(),
            last_fingerprint: None,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Case-insensitive keyword hits in `content`
    pub fn matched_keywords(&self, content: &str) -> Vec<String> {
        let haystack = content.to_lowercase();
        self.keywords
            .iter()
            .filter(|kw| haystack.contains(&kw.to_lowercase()))
            .cloned()
            .collect()
    }

    pub fn observe(&mut self, content: &str) -> ContentChange {
        let fingerprint = fingerprint(content);

        match self.last_fingerprint.replace(fingerprint) {
            None => ContentChange::Initial,
            Some(previous) if previous == fingerprint => ContentChange::Unchanged,
            Some(_) if self.keywords.is_empty() => {
                ContentChange::Changed(Some("News content updated".to_string()))
            }
            Some(_) => {
                let found = self.matched_keywords(content);
                if found.is_empty() {
                    ContentChange::Changed(None)
                } else {
                    ContentChange::Changed(Some(format!("Keywords found: {}", found.join(", "))))
                }
            }
        }
    }
}

fn fingerprint(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Watches a page and notifies on change
#[derive(Debug, Default)]
pub struct NewsMonitorAutomation;

impl NewsMonitorAutomation {
    pub fn new() -> Self {
        Self
    }

    fn notify(ctx: &RunContext, method: NotificationMethod, message: &str) {
        info!(
            target: "notification",
            automation = %ctx.id(),
            "[{} {}] {}",
            method.label(),
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        );
    }

    async fn fetch(client: &reqwest::Client, url: &str) -> Result<String> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        response.text().await.map_err(|e| Error::Http(e.to_string()))
    }
}

#[async_trait]
impl Automation for NewsMonitorAutomation {
    fn name(&self) -> &str {
        "News Monitor"
    }

    fn description(&self) -> &str {
        "Monitors news websites for updates and sends notifications"
    }

    fn config_schema(&self) -> Vec<ConfigField> {
        vec![
            ConfigField::text("url", "News Website URL").required(),
            ConfigField::text("keywords", "Keywords to Monitor (comma-separated)")
                .with_default(""),
            ConfigField::number("check_interval", "Check Interval (seconds)")
                .with_default(DEFAULT_CHECK_INTERVAL_SECS.to_string()),
            ConfigField::select(
                "notification_method",
                "Notification Method",
                ["console", "email", "push"],
            )
            .with_default("console"),
        ]
    }

    async fn run(&self, ctx: &RunContext) -> Result<()> {
        let url = ctx.require_text("url")?;
        let interval = ctx.interval("check_interval", DEFAULT_CHECK_INTERVAL_SECS)?;
        let method = NotificationMethod::parse(&ctx.text_or("notification_method", "console"))?;
        let mut tracker = ContentTracker::new(&ctx.text_or("keywords", ""));

        let client = reqwest::Client::builder()
            .timeout(ctx.http_timeout())
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        info!("Starting news monitoring for {} ({})", url, ctx.id().short());
        if !tracker.keywords().is_empty() {
            info!("Monitoring keywords: {}", tracker.keywords().join(", "));
        }

        while !ctx.is_cancelled() {
            debug!("Checking news at {}", url);

            let content = tokio::select! {
                _ = ctx.cancelled() => break,
                fetched = Self::fetch(&client, &url) => fetched,
            };

            match content {
                Ok(content) => {
                    match tracker.observe(&content) {
                        ContentChange::Initial => debug!("Initial content captured for {}", url),
                        ContentChange::Unchanged => {}
                        ContentChange::Changed(None) => {
                            debug!("Content changed at {}, no keyword hit", url)
                        }
                        ContentChange::Changed(Some(message)) => {
                            Self::notify(ctx, method, &message)
                        }
                    }

                    if ctx.wait(interval).await {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Error monitoring news at {}: {}", url, e);
                    if ctx.backoff().await {
                        break;
                    }
                }
            }
        }

        info!("News monitoring stopped for {}", url);
        Ok(())
    }
}
