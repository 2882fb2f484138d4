use clap::Parser;
use label_station::{AppError, Cli, Config, init_logger_with_file, run, setup_environment};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // 1. Environment (.env) before clap reads env defaults
    setup_environment();
    let cli = Cli::parse();

    // 2. Configuration
    let mut config = Config::from_env();
    cli.apply(&mut config);

    // 3. Logging
    init_logger_with_file(Some(&config.log_level), config.log_dir.as_deref());
    tracing::debug!(work_dir = %config.work_dir.display(), "Label station starting");

    // 4. Command
    match run(cli, config).await {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::FAILURE),
        Err(e @ (AppError::Storage(_) | AppError::Task(_) | AppError::Io(_))) => {
            Err(anyhow::Error::new(e).context("label station failed"))
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}
