//! Command handlers -- one module per subcommand

pub mod config;
pub mod filter;
pub mod log;
pub mod snapshot;
pub mod stream;

use std::path::Path;

use tokio::io::AsyncReadExt;

use diagpost_core::config::DiagpostConfig;
use diagpost_ingest::{IngestConfig, IngestService, IngestServiceBuilder, WebhookTransport};

use crate::error::CliError;

/// Build the ingest service for a command.
///
/// `watch` overrides `filter.watch`; one-shot commands never need the watcher.
pub async fn build_service(
    config: &DiagpostConfig,
    watch: bool,
) -> Result<IngestService<WebhookTransport>, CliError> {
    let mut ingest = IngestConfig::from_core(config);
    ingest.watch_filter_config = watch && config.filter.watch;
    let service = IngestServiceBuilder::new().config(ingest).build().await?;
    Ok(service)
}

/// Read a whole input file, or stdin when the path is `-`.
pub async fn read_input(path: &Path) -> Result<Vec<u8>, CliError> {
    let mut buf = Vec::new();
    if path == Path::new("-") {
        tokio::io::stdin().read_to_end(&mut buf).await?;
    } else {
        buf = tokio::fs::read(path).await.map_err(|e| {
            CliError::Command(format!("failed to read {}: {e}", path.display()))
        })?;
    }
    Ok(buf)
}
