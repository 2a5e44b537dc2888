//! `diagpost filter` command handler

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use diagpost_core::config::DiagpostConfig;
use diagpost_ingest::{AlertTransport, IngestService, ReloadOutcome};

use super::build_service;
use crate::cli::{FilterAction, FilterArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `filter` command.
pub async fn execute(
    args: FilterArgs,
    config: &DiagpostConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let service = build_service(config, false).await?;

    let result = match args.action {
        FilterAction::Stats => Ok(stats(&service)),
        FilterAction::Reload => reload(&service).await,
    };
    service.shutdown().await;

    writer.render(&result?)
}

/// Summarize the active filter document.
pub fn stats<T: AlertTransport>(service: &IngestService<T>) -> FilterReport {
    let engine = service.engine();
    let active = engine.active();
    let statistics = engine.statistics();
    let doc = &active.document;

    FilterReport {
        config_path: engine.config_path().display().to_string(),
        reload: None,
        fingerprint: active.fingerprint.clone(),
        loaded_at: statistics.config_loaded_at,
        filter_enabled: doc.filter_config.enabled,
        filter_rules: doc.filter_config.rules.iter().filter(|r| r.enabled).count(),
        alert_enabled: doc.alert_config.enabled,
        alert_rules: doc.alert_config.rules.iter().filter(|r| r.rule.enabled).count(),
        webhook_configured: !doc.alert_config.webhook.is_empty(),
        compiled_regexes: active.matcher.regex_count(),
        processed: statistics.processed,
        filtered: statistics.filtered,
        alerts_fired: statistics.alerts_fired,
    }
}

/// Re-read the filter document and report the result.
///
/// A malformed document is an error; the previously active rules stay in place.
pub async fn reload<T: AlertTransport>(
    service: &IngestService<T>,
) -> Result<FilterReport, CliError> {
    let outcome = service.reload_filter_config().await?;
    let mut report = stats(service);
    report.reload = Some(
        match outcome {
            ReloadOutcome::Unchanged => "unchanged",
            ReloadOutcome::Reloaded => "reloaded",
        }
        .to_owned(),
    );
    Ok(report)
}

/// Active filter rules and counters.
#[derive(Debug, Serialize)]
pub struct FilterReport {
    pub config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reload: Option<String>,
    pub fingerprint: Option<String>,
    pub loaded_at: DateTime<Utc>,
    pub filter_enabled: bool,
    pub filter_rules: usize,
    pub alert_enabled: bool,
    pub alert_rules: usize,
    pub webhook_configured: bool,
    pub compiled_regexes: usize,
    pub processed: u64,
    pub filtered: u64,
    pub alerts_fired: u64,
}

impl Render for FilterReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Filter Config: {}", self.config_path.bold())?;
        if let Some(ref reload) = self.reload {
            writeln!(w, "  Reload:    {}", reload.bold())?;
        }
        writeln!(
            w,
            "  Loaded:    {}",
            self.loaded_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        match self.fingerprint {
            Some(ref fp) => writeln!(w, "  SHA-256:   {fp}")?,
            None => writeln!(w, "  SHA-256:   {}", "(builtin defaults)".yellow())?,
        }
        writeln!(
            w,
            "  Filtering: {} ({} rules)",
            on_off(self.filter_enabled),
            self.filter_rules
        )?;
        writeln!(
            w,
            "  Alerts:    {} ({} rules, webhook {})",
            on_off(self.alert_enabled),
            self.alert_rules,
            if self.webhook_configured { "set" } else { "missing" }
        )?;
        writeln!(w, "  Regexes:   {}", self.compiled_regexes)?;
        writeln!(
            w,
            "  Counters:  processed={} filtered={} alerts={}",
            self.processed, self.filtered, self.alerts_fired
        )
    }
}

fn on_off(enabled: bool) -> colored::ColoredString {
    use colored::Colorize;

    if enabled { "on".green() } else { "off".red() }
}
