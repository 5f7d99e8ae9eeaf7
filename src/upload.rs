//! High-level pipeline: create a dataset, then upload a directory into it.
//!
//! [`upload_directory`] runs one upload as a strictly sequential state machine:
//!   - **Init**: create the dataset. Failure aborts the run before any file is
//!     touched.
//!   - **Scanning**: enumerate the root directory completely. Failure aborts
//!     the run; the freshly created dataset is left in place.
//!   - **Uploading**: read and submit each file in scan order, one at a time.
//!     A read or submit failure is recorded for that file and the loop moves
//!     on; it never short-circuits.
//!   - **Completed**: return an [`UploadReport`] no matter how many files
//!     failed.
//!
//! There is no retry and no rollback. The dataset keeps every document that
//! made it.
//!
//! [`cleanup_datasets`] is the maintenance counterpart: it removes every
//! dataset whose name starts with a prefix, one deletion at a time.

use std::fmt;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::UploadOptions;
use crate::contract::{Dataset, DatasetApi};
use crate::error::{CleanupError, UploadError};
use crate::progress::Progress;
use crate::scan::{DirectoryScanner, FileEntry};

/// Page size used when listing datasets for cleanup.
pub const LIST_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Read,
    Submit,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Read => f.write_str("read"),
            FailureStage::Submit => f.write_str("upload"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadStatus {
    Succeeded { document_id: String, batch: String },
    Failed { stage: FailureStage, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    /// Relative path of the file, which is also the document name.
    pub path: String,
    pub status: UploadStatus,
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, UploadStatus::Succeeded { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub dataset: Dataset,
    pub outcomes: Vec<UploadOutcome>,
}

impl UploadReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &UploadOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

pub async fn upload_directory<A>(
    api: &A,
    options: &UploadOptions,
    progress: &dyn Progress,
) -> Result<UploadReport, UploadError>
where
    A: DatasetApi + ?Sized,
{
    let result = run_upload(api, options, progress).await;
    match &result {
        Ok(report) => progress.completed(report),
        Err(e) => progress.failed(e),
    }
    result
}

async fn run_upload<A>(
    api: &A,
    options: &UploadOptions,
    progress: &dyn Progress,
) -> Result<UploadReport, UploadError>
where
    A: DatasetApi + ?Sized,
{
    info!(
        root = %options.root_directory.display(),
        dataset_name = %options.dataset_name,
        "[UPLOAD] Starting upload run"
    );

    // Init
    let dataset = match api.create_dataset(options.dataset_request()).await {
        Ok(dataset) => {
            info!(dataset_id = %dataset.id, "[UPLOAD] Dataset created");
            dataset
        }
        Err(e) => {
            error!(error = %e, "[UPLOAD][ERROR] Dataset creation failed");
            return Err(UploadError::CreateDataset(e));
        }
    };
    progress.dataset_created(&dataset);

    // Scanning
    progress.scanning(&options.root_directory);
    let files = match DirectoryScanner::new(&options.root_directory)
        .with_excludes(&options.exclude)
        .and_then(|scanner| scanner.scan())
    {
        Ok(files) => files,
        Err(e) => {
            error!(error = %e, dataset_id = %dataset.id, "[UPLOAD][ERROR] Directory scan failed");
            return Err(UploadError::Scan(e));
        }
    };
    progress.files_found(files.len());
    info!(count = files.len(), "[UPLOAD] Found files, starting upload");

    // Uploading
    let mut outcomes = Vec::with_capacity(files.len());
    for file in &files {
        let outcome = upload_file(api, &dataset.id, options, file).await;
        progress.file_finished(&outcome);
        outcomes.push(outcome);
    }

    let report = UploadReport { dataset, outcomes };
    info!(
        attempted = report.attempted(),
        succeeded = report.succeeded(),
        failed = report.failed(),
        "[UPLOAD] Upload run completed"
    );
    Ok(report)
}

async fn upload_file<A>(
    api: &A,
    dataset_id: &str,
    options: &UploadOptions,
    file: &FileEntry,
) -> UploadOutcome
where
    A: DatasetApi + ?Sized,
{
    let path = file.relative_path.clone();

    let text = match std::fs::read_to_string(&file.absolute_path) {
        Ok(text) => text,
        Err(e) => {
            warn!(file = %path, error = %e, "[UPLOAD] Failed to read file");
            return UploadOutcome {
                path,
                status: UploadStatus::Failed {
                    stage: FailureStage::Read,
                    message: e.to_string(),
                },
            };
        }
    };

    debug!(file = %path, bytes = text.len(), "[UPLOAD] Submitting document");
    let request = options.document.request(&path, text);
    let status = match api.create_document_by_text(dataset_id, request).await {
        Ok(created) => {
            info!(file = %path, document_id = %created.document.id, "[UPLOAD] Uploaded");
            UploadStatus::Succeeded {
                document_id: created.document.id,
                batch: created.batch,
            }
        }
        Err(e) => {
            warn!(file = %path, error = %e, "[UPLOAD] Failed to upload file");
            UploadStatus::Failed {
                stage: FailureStage::Submit,
                message: e.to_string(),
            }
        }
    };
    UploadOutcome { path, status }
}

/// Deletes every dataset whose name starts with `prefix` and returns the ids
/// that were deleted, in listing order.
///
/// Deletions are issued one at a time. The first failure stops the cleanup
/// and [`CleanupError::Delete`] carries the ids already removed.
pub async fn cleanup_datasets<A>(api: &A, prefix: &str) -> Result<Vec<String>, CleanupError>
where
    A: DatasetApi + ?Sized,
{
    if prefix.is_empty() {
        error!("[CLEANUP][ERROR] Refusing to clean up with an empty prefix");
        return Err(CleanupError::EmptyPrefix);
    }
    let mut matching = Vec::new();
    let mut page = 1;
    loop {
        let listing = api
            .list_datasets(page, LIST_PAGE_SIZE)
            .await
            .map_err(CleanupError::List)?;
        matching.extend(
            listing
                .data
                .into_iter()
                .filter(|d| d.name.starts_with(prefix))
                .map(|d| d.id),
        );
        if !listing.has_more {
            break;
        }
        page += 1;
    }
    info!(prefix, count = matching.len(), "[CLEANUP] Deleting matching datasets");

    let mut deleted = Vec::with_capacity(matching.len());
    for id in matching {
        if let Err(source) = api.delete_dataset(&id).await {
            error!(
                dataset_id = %id,
                deleted = deleted.len(),
                error = %source,
                "[CLEANUP][ERROR] Deletion failed, stopping"
            );
            return Err(CleanupError::Delete {
                id,
                deleted,
                source,
            });
        }
        debug!(dataset_id = %id, "[CLEANUP] Deleted");
        deleted.push(id);
    }
    Ok(deleted)
}
