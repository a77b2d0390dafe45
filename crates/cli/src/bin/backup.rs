use std::process::ExitCode;

use backup_cli::backup::{BackupCli, run};
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    utils::logging::init_tracing();

    let cli = BackupCli::parse();
    if run(cli).await {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
