use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::fmt;
use tracing::{debug, instrument};

use crate::google::model::{FileListResp, RemoteFile};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/";
const PDF_MIME_TYPE: &str = "application/pdf";
const LIST_FIELDS: &str = "files(id, name, webViewLink)";

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    access_token: String,
}

impl fmt::Debug for DriveClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait DriveService: Send + Sync {
    /// PDFs whose parent is `folder_id`. Only the first result page is read.
    async fn list_pdfs(&self, folder_id: &str) -> Result<Vec<RemoteFile>>;
}

impl DriveClient {
    pub fn new(access_token: String) -> Self {
        let base_url = Url::parse(DRIVE_API_BASE).expect("valid default Drive URL");
        Self::with_base_url(access_token, base_url)
    }

    pub fn with_base_url(access_token: String, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("drive-reading-list/0.1")
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            access_token,
        }
    }

    pub fn build_list_request(&self, folder_id: &str) -> Result<reqwest::Request> {
        let endpoint = self
            .base_url
            .join("drive/v3/files")
            .context("invalid Drive base URL")?;
        let query = build_files_query(folder_id);
        self.http
            .get(endpoint)
            .bearer_auth(&self.access_token)
            .query(&[("q", query.as_str()), ("fields", LIST_FIELDS)])
            .build()
            .context("failed to build Drive request")
    }

    #[instrument(skip(self))]
    pub async fn list_pdfs(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        let request = self.build_list_request(folder_id)?;
        debug!(url=%request.url(), "listing drive folder");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach Google Drive")?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("received 429 from Google Drive: {}", body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("drive error {}: {}", status, body));
        }

        let payload: FileListResp = res.json().await.context("invalid Drive response")?;
        debug!(count = payload.files.len(), "drive files listed");
        Ok(payload.files)
    }
}

#[async_trait]
impl DriveService for DriveClient {
    async fn list_pdfs(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        DriveClient::list_pdfs(self, folder_id).await
    }
}

/// Drive search expression selecting PDFs directly inside `folder_id`.
pub fn build_files_query(folder_id: &str) -> String {
    let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!(
        "'{}' in parents and mimeType='{}'",
        escaped, PDF_MIME_TYPE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_query_filters_parent_and_mime_type() {
        assert_eq!(
            build_files_query("1AbC"),
            "'1AbC' in parents and mimeType='application/pdf'"
        );
    }

    #[test]
    fn files_query_escapes_quotes() {
        assert_eq!(
            build_files_query("it's"),
            "'it\\'s' in parents and mimeType='application/pdf'"
        );
    }

    #[test]
    fn list_request_projects_fields_and_sets_auth() {
        let client = DriveClient::new("ya29.token".into());
        let request = client.build_list_request("folder-1").unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.url().path(), "/drive/v3/files");
        let pairs: std::collections::HashMap<_, _> =
            request.url().query_pairs().into_owned().collect();
        assert_eq!(
            pairs["q"],
            "'folder-1' in parents and mimeType='application/pdf'"
        );
        assert_eq!(pairs["fields"], "files(id, name, webViewLink)");
        assert_eq!(
            request
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "Bearer ya29.token"
        );
    }

    #[test]
    fn empty_listing_parses_to_no_files() {
        let resp: FileListResp = serde_json::from_str("{}").unwrap();
        assert!(resp.files.is_empty());
        let resp: FileListResp = serde_json::from_str(r#"{"files":[]}"#).unwrap();
        assert!(resp.files.is_empty());
    }
}
