//! Schema of the reading list database and the request that creates it.
use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::model::ReadingStatus;
use crate::notion::NotionService;

pub const PROP_NAME: &str = "Name";
pub const PROP_STATUS: &str = "Status";
pub const PROP_LINK: &str = "Link";

/// Body for `POST /v1/databases`: a child database of `page_id` with a
/// `Name` title, a `Status` select and a `Link` url property.
pub fn build_database_request(page_id: &str, name: &str) -> Value {
    let options: Vec<Value> = ReadingStatus::ALL
        .iter()
        .map(|s| json!({ "name": s.as_str(), "color": s.color() }))
        .collect();

    json!({
        "parent": { "type": "page_id", "page_id": page_id },
        "title": [ { "type": "text", "text": { "content": name } } ],
        "properties": {
            PROP_NAME: { "title": {} },
            PROP_STATUS: { "select": { "options": options } },
            PROP_LINK: { "url": {} },
        },
    })
}

/// Create the reading list under `page_id` and return its database id.
#[instrument(skip(notion))]
pub async fn create_list(notion: &dyn NotionService, page_id: &str, name: &str) -> Result<String> {
    let id = notion
        .create_database(build_database_request(page_id, name))
        .await
        .with_context(|| format!("failed to create database '{}' under page {}", name, page_id))?;
    debug!(database_id = %id, "created reading list database");
    Ok(id)
}
