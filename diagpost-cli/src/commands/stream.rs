//! `diagpost stream` command handler
//!
//! Reads newline-delimited records from stdin until EOF or Ctrl-C. The filter
//! configuration watcher stays active for the whole run when `filter.watch` is set.

use std::io::Write;

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use diagpost_core::config::DiagpostConfig;
use diagpost_ingest::{AlertTransport, IngestService, LogDisposition};

use super::build_service;
use crate::cli::StreamArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `stream` command.
pub async fn execute(
    args: StreamArgs,
    config: &DiagpostConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let service = build_service(config, true).await?;
    tracing::info!(client_ip = %args.ip, watching = service.is_watching(), "streaming records from stdin");

    let reader = BufReader::new(tokio::io::stdin());
    let result = tokio::select! {
        result = run(&service, reader, &args.ip) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, stopping stream");
            Ok(summarize(&service, StreamReport::default()))
        }
    };
    service.shutdown().await;

    writer.render(&result?)
}

/// Ingest every non-blank line of `reader` as one record.
///
/// A record that cannot be persisted is counted as failed and the stream continues.
pub async fn run<T, R>(
    service: &IngestService<T>,
    reader: R,
    client_ip: &str,
) -> Result<StreamReport, CliError>
where
    T: AlertTransport,
    R: AsyncBufRead + Unpin,
{
    let mut report = StreamReport::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let record = line.trim_end_matches('\r');
        if record.trim().is_empty() {
            continue;
        }
        report.records += 1;
        match service.process_log(record, client_ip) {
            Ok(LogDisposition::Kept) => report.kept += 1,
            Ok(LogDisposition::Dropped) => report.dropped += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(error = %e, "record not persisted");
            }
        }
    }

    Ok(summarize(service, report))
}

fn summarize<T: AlertTransport>(service: &IngestService<T>, mut report: StreamReport) -> StreamReport {
    report.alerts_fired = service.statistics().alerts_fired;
    report
}

/// Counters for one streaming run.
#[derive(Debug, Default, Serialize)]
pub struct StreamReport {
    pub records: u64,
    pub kept: u64,
    pub dropped: u64,
    pub failed: u64,
    pub alerts_fired: u64,
}

impl Render for StreamReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Stream Summary")?;
        writeln!(w, "  Records: {}", self.records)?;
        writeln!(w, "  Kept:    {}", self.kept.to_string().green())?;
        writeln!(w, "  Dropped: {}", self.dropped)?;
        if self.failed > 0 {
            writeln!(w, "  Failed:  {}", self.failed.to_string().red().bold())?;
        }
        writeln!(w, "  Alerts:  {}", self.alerts_fired)
    }
}
