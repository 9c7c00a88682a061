use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use drive_reading_list::config;
use drive_reading_list::notion::NotionClient;

/// List the databases under the configured page, the ones the sync would
/// consider archiving.
#[derive(Parser, Debug)]
struct Args {
    /// Path to YAML config
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Page to inspect instead of the configured one
    #[arg(long)]
    page_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cfg = config::load(Some(&args.config))?;
    let page_id = args.page_id.unwrap_or_else(|| cfg.notion.page_id.clone());
    let client = NotionClient::new(cfg.notion.token.clone(), cfg.notion.version.clone());

    let blocks = client
        .list_block_children(&page_id)
        .await
        .with_context(|| format!("failed to list children of page {}", page_id))?;
    println!("Page ID: {}", page_id);
    for block in blocks.iter().filter(|b| b.is_child_database()) {
        match client.retrieve_database(&block.id).await {
            Ok(db) => {
                let title = db.title_text().unwrap_or("<no text title>");
                let marker = if title == cfg.notion.database_name {
                    " (would be archived)"
                } else {
                    ""
                };
                println!("Database {} \"{}\"{}", db.id, title, marker);
                for (name, prop) in db.properties {
                    println!("  {} -> {{ id: {}, type: {} }}", name, prop.id, prop.typ);
                }
            }
            Err(err) => println!("Database {} could not be retrieved: {:#}", block.id, err),
        }
    }
    Ok(())
}
