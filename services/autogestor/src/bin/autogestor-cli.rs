//! AutoGestor 运维命令行入口

use std::process::ExitCode;

use ag_bootstrap::Infrastructure;
use ag_config::AppConfig;
use ag_telemetry::init_cli_tracing;
use autogestor::cli::{self, Cli};
use autogestor::container::Container;
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();
    init_cli_tracing(&args.log_level);

    let config = match AppConfig::load(&args.config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let infra = match Infrastructure::from_config(config).await {
        Ok(infra) => infra,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let container = match Container::from_infrastructure(&infra).await {
        Ok(container) => container,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut stdout = std::io::stdout().lock();
    match cli::run(&args.command, &container.maintenance, &mut stdout).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
