//! `diagpost log` command handler

use std::io::Write;

use serde::Serialize;

use diagpost_core::config::DiagpostConfig;
use diagpost_ingest::{AlertTransport, IngestService};

use super::{build_service, read_input};
use crate::cli::LogArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `log` command.
pub async fn execute(
    args: LogArgs,
    config: &DiagpostConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let body = read_input(&args.input).await?;
    let service = build_service(config, false).await?;

    let result = run(&service, &body, &args.ip);
    service.shutdown().await;

    writer.render(&result?)
}

/// Decode and ingest one upload body.
pub fn run<T: AlertTransport>(
    service: &IngestService<T>,
    body: &[u8],
    client_ip: &str,
) -> Result<LogReport, CliError> {
    let disposition = service.ingest_upload(body, client_ip)?;
    Ok(LogReport {
        client_ip: client_ip.to_owned(),
        bytes: body.len(),
        kept: disposition.is_kept(),
        disposition: disposition.to_string(),
    })
}

/// Outcome of one upload.
#[derive(Debug, Serialize)]
pub struct LogReport {
    pub client_ip: String,
    pub bytes: usize,
    pub disposition: String,
    pub kept: bool,
}

impl Render for LogReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let status = if self.kept {
            self.disposition.green().bold()
        } else {
            self.disposition.yellow().bold()
        };
        writeln!(
            w,
            "Upload from {} ({} bytes): {}",
            self.client_ip.bold(),
            self.bytes,
            status
        )
    }
}
