use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, warn};

use crate::notion::model::{Block, BlockChildrenResp, CreatedObjectResp, RetrieveDatabaseResp};

pub mod model;

const NOTION_API_BASE: &str = "https://api.notion.com/";

#[derive(Clone)]
pub struct NotionClient {
    http: Client,
    base_url: Url,
    token: String,
    version: String,
}

impl fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// The Notion calls the sync needs. `create_*` take ready-made request bodies
/// and return the id of the created object.
#[async_trait]
pub trait NotionService: Send + Sync {
    async fn list_block_children(&self, block_id: &str) -> Result<Vec<Block>>;

    async fn retrieve_database(&self, database_id: &str) -> Result<RetrieveDatabaseResp>;

    async fn archive_block(&self, block_id: &str) -> Result<()>;

    async fn create_database(&self, body: Value) -> Result<String>;

    async fn create_page(&self, body: Value) -> Result<String>;
}

impl NotionClient {
    pub fn new(token: String, version: String) -> Self {
        let base_url = Url::parse(NOTION_API_BASE).expect("valid default Notion URL");
        Self::with_base_url(token, version, base_url)
    }

    pub fn with_base_url(token: String, version: String, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("drive-reading-list/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            token,
            version,
        }
    }

    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join(path)
            .context("invalid Notion base URL")?;
        let mut builder = self
            .http
            .request(method, endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Notion-Version", &self.version);
        if let Some(body) = body {
            builder = builder
                .header("Content-Type", "application/json")
                .json(body);
        }
        builder.build().context("failed to build Notion request")
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let request = self.build_request(method, path, body)?;
        debug!(method=%request.method(), url=%request.url(), "sending notion request");
        if let Some(body) = body {
            debug!(payload=%body, "notion request payload");
        }

        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach Notion")?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            warn!("Rate limited by Notion: {}", body);
            return Err(anyhow!("received 429 from Notion: {}", body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("notion error {}: {}", status, body));
        }

        res.json::<T>().await.context("invalid Notion response")
    }

    /// First page of direct children of a block or page.
    pub async fn list_block_children(&self, block_id: &str) -> Result<Vec<Block>> {
        let path = format!("v1/blocks/{}/children?page_size=100", block_id);
        let resp: BlockChildrenResp = self.execute(Method::GET, &path, None).await?;
        if resp.has_more {
            warn!(block_id, "block has more children than one page; only the first page is inspected");
        }
        Ok(resp.results)
    }

    pub async fn retrieve_database(&self, database_id: &str) -> Result<RetrieveDatabaseResp> {
        let path = format!("v1/databases/{}", database_id);
        self.execute(Method::GET, &path, None).await
    }

    pub async fn archive_block(&self, block_id: &str) -> Result<()> {
        let path = format!("v1/blocks/{}", block_id);
        let body = json!({ "archived": true });
        let _: Value = self.execute(Method::PATCH, &path, Some(&body)).await?;
        Ok(())
    }

    pub async fn create_database(&self, body: Value) -> Result<String> {
        let created: CreatedObjectResp = self
            .execute(Method::POST, "v1/databases", Some(&body))
            .await?;
        Ok(created.id)
    }

    pub async fn create_page(&self, body: Value) -> Result<String> {
        let created: CreatedObjectResp = self.execute(Method::POST, "v1/pages", Some(&body)).await?;
        Ok(created.id)
    }
}

#[async_trait]
impl NotionService for NotionClient {
    async fn list_block_children(&self, block_id: &str) -> Result<Vec<Block>> {
        NotionClient::list_block_children(self, block_id).await
    }

    async fn retrieve_database(&self, database_id: &str) -> Result<RetrieveDatabaseResp> {
        NotionClient::retrieve_database(self, database_id).await
    }

    async fn archive_block(&self, block_id: &str) -> Result<()> {
        NotionClient::archive_block(self, block_id).await
    }

    async fn create_database(&self, body: Value) -> Result<String> {
        NotionClient::create_database(self, body).await
    }

    async fn create_page(&self, body: Value) -> Result<String> {
        NotionClient::create_page(self, body).await
    }
}
