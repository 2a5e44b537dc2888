//! `diagpost snapshot` command handler

use std::io::Write;

use serde::Serialize;

use diagpost_core::config::DiagpostConfig;
use diagpost_ingest::{AlertTransport, IngestService, SnapshotEnvelope};

use super::{build_service, read_input};
use crate::cli::SnapshotArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `snapshot` command.
pub async fn execute(
    args: SnapshotArgs,
    config: &DiagpostConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let raw = read_input(&args.envelope).await?;
    let service = build_service(config, false).await?;

    let result = run(&service, &raw).await;
    service.shutdown().await;

    writer.render(&result?)
}

/// Parse an envelope and store its payload.
pub async fn run<T: AlertTransport>(
    service: &IngestService<T>,
    raw: &[u8],
) -> Result<SnapshotReport, CliError> {
    let envelope = SnapshotEnvelope::from_json(raw)?;
    let path = service.store_snapshot(&envelope).await?;
    Ok(SnapshotReport {
        uid: envelope.uid,
        client_ip: envelope.ip,
        file_type: envelope.file_type.to_string(),
        path: path.display().to_string(),
    })
}

/// Where a snapshot was stored.
#[derive(Debug, Serialize)]
pub struct SnapshotReport {
    pub uid: String,
    pub client_ip: String,
    pub file_type: String,
    pub path: String,
}

impl Render for SnapshotReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Snapshot stored ({})", self.file_type.bold())?;
        writeln!(w, "  UID:  {}", self.uid)?;
        writeln!(w, "  IP:   {}", self.client_ip)?;
        writeln!(w, "  Path: {}", self.path.green())
    }
}
