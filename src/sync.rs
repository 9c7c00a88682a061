//! The reading list sync: authenticate, list the Drive folder, archive the
//! previous list, create a new one and import one entry per PDF.
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{self, Config, ConfigError};
use crate::google::auth::{AuthError, CredentialManager, FileCredentialStore};
use crate::google::drive::{DriveClient, DriveService};
use crate::importer::import_entries;
use crate::model::ItemFailure;
use crate::notion::{NotionClient, NotionService};
use crate::reading_list::create_list;
use crate::reconcile::archive_existing;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("drive authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("failed to list drive folder: {0:#}")]
    Listing(anyhow::Error),
    #[error("failed to list blocks of the target page: {0:#}")]
    PageBlocks(anyhow::Error),
    #[error("failed to create the reading list: {0:#}")]
    CreateList(anyhow::Error),
}

/// Where the sync reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub folder_id: String,
    pub page_id: String,
    pub database_name: String,
}

impl SyncTarget {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            folder_id: cfg.drive.folder_id.clone(),
            page_id: cfg.notion.page_id.clone(),
            database_name: cfg.notion.database_name.clone(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub archived: Vec<String>,
    pub reconcile_failures: Vec<ItemFailure>,
    /// Id of the new database; `None` when the folder held no PDFs.
    pub database_id: Option<String>,
    pub imported: Vec<String>,
    pub import_failures: Vec<ItemFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.reconcile_failures.is_empty() && self.import_failures.is_empty()
    }

    /// Items that failed: databases that could not be checked plus entries
    /// that could not be created.
    pub fn failed(&self) -> usize {
        self.reconcile_failures.len() + self.import_failures.len()
    }
}

/// Run the sync against already authenticated services.
///
/// The previous list is archived before the emptiness check, so an empty
/// folder still removes it.
#[instrument(skip_all, fields(folder_id = %target.folder_id, page_id = %target.page_id))]
pub async fn run(
    drive: &dyn DriveService,
    notion: &dyn NotionService,
    target: &SyncTarget,
) -> Result<SyncReport, SyncError> {
    let files = drive
        .list_pdfs(&target.folder_id)
        .await
        .map_err(SyncError::Listing)?;
    debug!(count = files.len(), "listed drive folder");

    let reconciled = archive_existing(notion, &target.page_id, &target.database_name)
        .await
        .map_err(SyncError::PageBlocks)?;
    let mut report = SyncReport {
        archived: reconciled.archived,
        reconcile_failures: reconciled.failures,
        ..SyncReport::default()
    };

    if files.is_empty() {
        info!("no pdf files found in the specified google drives folder");
        return Ok(report);
    }

    let database_id = create_list(notion, &target.page_id, &target.database_name)
        .await
        .map_err(SyncError::CreateList)?;
    let imported = import_entries(notion, &database_id, &files).await;

    report.database_id = Some(database_id);
    report.imported = imported.imported;
    report.import_failures = imported.failures;
    Ok(report)
}

/// Build the real clients from configuration and run the sync. Acquiring
/// the Drive credential may block on the browser consent flow.
pub async fn run_from_config(cfg: &Config) -> Result<SyncReport, SyncError> {
    let notion = NotionClient::new(cfg.notion.token.clone(), cfg.notion.version.clone());
    let store = FileCredentialStore::new(&cfg.drive.token_path);
    let credential = CredentialManager::new(store, &cfg.drive.client_secret_path)
        .acquire()
        .await?;
    let drive = DriveClient::new(credential.access_token);
    run(&drive, &notion, &SyncTarget::from_config(cfg)).await
}

/// Load configuration from `config_path` (plus `.env` and the environment)
/// and run the sync with the real clients.
pub async fn run_with_config_file(config_path: &Path) -> Result<SyncReport, SyncError> {
    let cfg = config::load(Some(config_path))?;
    let missing = cfg.missing_required();
    if !missing.is_empty() {
        warn!(?missing, "required settings are empty; requests that need them will fail");
    }
    run_from_config(&cfg).await
}

/// Emit the final status line for a run. Per-item failures were already
/// logged as they happened, so only their count appears here.
pub fn log_outcome(outcome: &Result<SyncReport, SyncError>) {
    match outcome {
        Ok(report) => info!(
            "successfully imported books to notion ({} archived, {} imported, {} failed)",
            report.archived.len(),
            report.imported.len(),
            report.failed()
        ),
        Err(err) => error!("Error importing books to notion: {}", err),
    }
}
