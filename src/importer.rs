//! One reading list entry per Drive file.
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::google::model::RemoteFile;
use crate::model::{ItemFailure, ReadingStatus};
use crate::notion::NotionService;
use crate::reading_list::{PROP_LINK, PROP_NAME, PROP_STATUS};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: Vec<String>,
    pub failures: Vec<ItemFailure>,
}

/// Entry title for a file: the first ".pdf" in the name is removed, so
/// "a.pdf.pdf" becomes "a.pdf".
pub fn display_title(file_name: &str) -> String {
    file_name.replacen(".pdf", "", 1)
}

/// Body for `POST /v1/pages`: a row in `database_id` with status "To Read",
/// the file's link and an embed block previewing it.
pub fn build_entry_request(database_id: &str, file: &RemoteFile) -> Value {
    json!({
        "parent": { "database_id": database_id },
        "properties": {
            PROP_NAME: { "title": [ { "text": { "content": display_title(&file.name) } } ] },
            PROP_STATUS: { "select": { "name": ReadingStatus::ToRead.as_str() } },
            PROP_LINK: { "url": file.web_view_link },
        },
        "children": [
            { "type": "embed", "embed": { "url": file.web_view_link } }
        ],
    })
}

/// Create an entry for each file in the order given. A failed creation is
/// recorded against the file name and the remaining files are still imported.
#[instrument(skip(notion, files), fields(count = files.len()))]
pub async fn import_entries(
    notion: &dyn NotionService,
    database_id: &str,
    files: &[RemoteFile],
) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();
    for file in files {
        match notion.create_page(build_entry_request(database_id, file)).await {
            Ok(page_id) => {
                info!("Successfully created a page for: {}", file.name);
                debug!(%page_id, "created reading list entry");
                outcome.imported.push(file.name.clone());
            }
            Err(err) => {
                warn!("Error creating page for {}: {:#}", file.name, err);
                outcome.failures.push(ItemFailure::new(&file.name, &err));
            }
        }
    }
    outcome
}
