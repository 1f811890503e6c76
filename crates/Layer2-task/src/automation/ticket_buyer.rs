//! Ticket buyer - periodic availability checker (placeholder search)

use super::{Automation, ConfigField, RunContext};
use async_trait::async_trait;
use chrono::NaiveTime;
use hub_foundation::{Error, Result};
use tracing::info;

const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;

/// Search window for one trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketQuery {
    pub date: String,
    pub time_start: String,
    pub time_end: String,
    pub from_station: String,
    pub to_station: String,
}

impl TicketQuery {
    fn from_context(ctx: &RunContext) -> Result<Self> {
        let query = Self {
            date: ctx.require_text("date")?,
            time_start: ctx.text_or("time_range_start", "08:00"),
            time_end: ctx.text_or("time_range_end", "18:00"),
            from_station: ctx.require_text("from_station")?,
            to_station: ctx.require_text("to_station")?,
        };

        let start = parse_time("time_range_start", &query.time_start)?;
        let end = parse_time("time_range_end", &query.time_end)?;
        if start > end {
            return Err(Error::InvalidInput(format!(
                "Departure window {}-{} is empty",
                query.time_start, query.time_end
            )));
        }
        Ok(query)
    }
}

/// `HH:MM`, hour may be unpadded
fn parse_time(key: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
        Error::InvalidInput(format!("Config field '{}' is not a HH:MM time: {}", key, value))
    })
}

/// Checks ticket availability on an interval
#[derive(Debug, Default)]
pub struct TicketBuyerAutomation;

impl TicketBuyerAutomation {
    pub fn new() -> Self {
        Self
    }

    /// Availability lookup. No ticket provider is wired in, so nothing is
    /// ever reported available.
    async fn check_availability(&self, query: &TicketQuery) -> Result<bool> {
        info!(
            "Checking tickets {} -> {} for {} {}-{}",
            query.from_station, query.to_station, query.date, query.time_start, query.time_end
        );
        Ok(false)
    }
}

#[async_trait]
impl Automation for TicketBuyerAutomation {
    fn name(&self) -> &str {
        "Ticket Buyer"
    }

    fn description(&self) -> &str {
        "Monitors train ticket availability and purchases when available"
    }

    fn config_schema(&self) -> Vec<ConfigField> {
        vec![
            ConfigField::date("date", "Travel Date").required(),
            ConfigField::time("time_range_start", "Earliest Departure Time")
                .required()
                .with_default("08:00"),
            ConfigField::time("time_range_end", "Latest Departure Time")
                .required()
                .with_default("18:00"),
            ConfigField::text("from_station", "From Station").required(),
            ConfigField::text("to_station", "To Station").required(),
            ConfigField::number("check_interval", "Check Interval (seconds)")
                .with_default(DEFAULT_CHECK_INTERVAL_SECS.to_string()),
        ]
    }

    async fn run(&self, ctx: &RunContext) -> Result<()> {
        let query = TicketQuery::from_context(ctx)?;
        let interval = ctx.interval("check_interval", DEFAULT_CHECK_INTERVAL_SECS)?;

        info!(
            "Starting ticket monitoring: {} -> {} on {} between {}-{}",
            query.from_station, query.to_station, query.date, query.time_start, query.time_end
        );

        while !ctx.is_cancelled() {
            let stopped = match self.check_availability(&query).await {
                Ok(true) => {
                    info!("Tickets available for {} on {}", query.to_station, query.date);
                    ctx.wait(interval).await
                }
                Ok(false) => ctx.wait(interval).await,
                Err(e) => {
                    tracing::warn!("Error checking tickets: {}", e);
                    ctx.backoff().await
                }
            };

            if stopped {
                break;
            }
        }

        info!("Ticket monitoring stopped ({})", ctx.id().short());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{AutomationConfig, AutomationId};
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn context(config: serde_json::Value, token: CancellationToken) -> RunContext {
        let config: AutomationConfig = match config {
            serde_json::Value::Object(map) => map,
            _ => AutomationConfig::new(),
        };
        RunContext::new(
            AutomationId::new(),
            config,
            token,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_missing_required_field_fails() {
        let ctx = context(json!({ "date": "2026-01-01" }), CancellationToken::new());
        let result = TicketBuyerAutomation::new().run(&ctx).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_inverted_window_fails() {
        let ctx = context(
            json!({
                "date": "2026-01-01",
                "from_station": "A",
                "to_station": "B",
                "time_range_start": "19:00",
                "time_range_end": "07:00"
            }),
            CancellationToken::new(),
        );
        assert!(TicketBuyerAutomation::new().run(&ctx).await.is_err());
    }

    #[test]
    fn test_unpadded_start_time_is_accepted() {
        let ctx = context(
            json!({
                "date": "2026-01-01",
                "from_station": "A",
                "to_station": "B",
                "time_range_start": "9:30"
            }),
            CancellationToken::new(),
        );
        let query = TicketQuery::from_context(&ctx).unwrap();
        assert_eq!(query.time_start, "9:30");
        assert_eq!(query.time_end, "18:00");
    }

    #[test]
    fn test_malformed_time_is_rejected() {
        let ctx = context(
            json!({
                "date": "2026-01-01",
                "from_station": "A",
                "to_station": "B",
                "time_range_end": "evening"
            }),
            CancellationToken::new(),
        );
        assert!(matches!(
            TicketQuery::from_context(&ctx),
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_exits_when_cancelled() {
        let token = CancellationToken::new();
        let ctx = context(
            json!({
                "date": "2026-01-01",
                "from_station": "A",
                "to_station": "B",
                "check_interval": 3600
            }),
            token.clone(),
        );

        let handle = tokio::spawn(async move { TicketBuyerAutomation::new().run(&ctx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("run should exit promptly")
            .unwrap();
        assert!(result.is_ok());
    }
}
