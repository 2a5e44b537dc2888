use std::process::ExitCode;

use clap::Parser;

use diagpost_cli::cli::{Cli, Commands};
use diagpost_cli::commands;
use diagpost_cli::error::CliError;
use diagpost_cli::logging::init_tracing;
use diagpost_cli::output::OutputWriter;
use diagpost_core::config::DiagpostConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);

    // `config` 명령은 잘못된 설정도 보고해야 하므로 로딩 실패를 여기서 바로 반환하지 않음
    let loaded = DiagpostConfig::load(&cli.config).await;
    let mut general = loaded
        .as_ref()
        .map(|c| c.general.clone())
        .unwrap_or_default();
    if let Some(level) = cli.log_level {
        general.log_level = level;
    }
    init_tracing(&general).map_err(|e| CliError::Config(e.to_string()))?;
    diagpost_core::metrics::describe_all();

    tracing::debug!(config = %cli.config.display(), "diagpost starting");

    match cli.command {
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
        Commands::Log(args) => commands::log::execute(args, &loaded?, &writer).await,
        Commands::Stream(args) => commands::stream::execute(args, &loaded?, &writer).await,
        Commands::Snapshot(args) => commands::snapshot::execute(args, &loaded?, &writer).await,
        Commands::Filter(args) => commands::filter::execute(args, &loaded?, &writer).await,
    }
}
