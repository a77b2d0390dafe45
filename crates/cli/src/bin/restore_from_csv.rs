use std::process::ExitCode;

use backup_cli::restore::{RestoreCli, run};
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    utils::logging::init_tracing();

    let cli = RestoreCli::parse();
    if run(cli).await {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
