//! Archival of a previously created reading list under the target page.
//!
//! Archiving the old database and creating the new one are two separate
//! requests; a failure in between leaves the page without a reading list.
use anyhow::{anyhow, Result};
use tracing::{info, instrument, warn};

use crate::model::ItemFailure;
use crate::notion::model::Block;
use crate::notion::NotionService;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub archived: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

/// Archive every child database of `page_id` whose first title segment is
/// exactly `name`. Listing the children must succeed; a failure while
/// inspecting one block is recorded and the scan continues.
#[instrument(skip(notion))]
pub async fn archive_existing(
    notion: &dyn NotionService,
    page_id: &str,
    name: &str,
) -> Result<ReconcileOutcome> {
    let blocks = notion.list_block_children(page_id).await?;
    let mut outcome = ReconcileOutcome::default();

    for block in blocks.iter().filter(|b| b.is_child_database()) {
        match archive_if_named(notion, block, name).await {
            Ok(true) => {
                info!("successfully archived block id {}", block.id);
                outcome.archived.push(block.id.clone());
            }
            Ok(false) => {}
            Err(err) => {
                warn!("Error checking database {}: {:#}", block.id, err);
                outcome.failures.push(ItemFailure::new(&block.id, &err));
            }
        }
    }
    Ok(outcome)
}

async fn archive_if_named(notion: &dyn NotionService, block: &Block, name: &str) -> Result<bool> {
    let db = notion.retrieve_database(&block.id).await?;
    let title = db
        .title_text()
        .ok_or_else(|| anyhow!("database {} has no text title", db.id))?;
    if title != name {
        return Ok(false);
    }
    notion.archive_block(&block.id).await?;
    Ok(true)
}
