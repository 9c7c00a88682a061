use clap::Parser;
use std::path::PathBuf;

use drive_reading_list::sync;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Rebuild a Notion reading list from the PDFs in a Google Drive folder"
)]
struct Args {
    /// Path to YAML config file (optional; .env and NOTION_KEY, NOTION_PAGE_ID, DRIVE_FOLDER_ID override it)
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let outcome = sync::run_with_config_file(&args.config).await;
    sync::log_outcome(&outcome);
    if outcome.is_err() {
        std::process::exit(1);
    }
}
