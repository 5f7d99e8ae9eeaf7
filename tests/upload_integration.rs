use std::fs::{create_dir_all, write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dify_upload::config::{DocumentSettings, UploadOptions};
use dify_upload::contract::{
    CreateDocumentByTextRequest, Dataset, DatasetPage, DocumentCreated, MockDatasetApi, Permission,
};
use dify_upload::error::{ApiError, CleanupError, ScanError, UploadError};
use dify_upload::progress::{Progress, SilentProgress};
use dify_upload::upload::{
    cleanup_datasets, upload_directory, FailureStage, UploadOutcome, UploadStatus,
};
use mockall::predicate::eq;
use serde_json::json;
use tempfile::tempdir;

fn options(root: &Path) -> UploadOptions {
    UploadOptions {
        root_directory: root.to_path_buf(),
        auth_token: "test-token".into(),
        base_url: "http://localhost/v1".into(),
        dataset_name: "[test] upload".into(),
        description: "Uploaded by tests".into(),
        permission: Permission::OnlyMe,
        provider: None,
        external_knowledge_api_id: None,
        external_knowledge_id: None,
        document: DocumentSettings::default(),
        exclude: Vec::new(),
        timeout: Duration::from_secs(5),
    }
}

fn dataset(id: &str, name: &str) -> Dataset {
    serde_json::from_value(json!({ "id": id, "name": name })).unwrap()
}

fn created(name: &str) -> DocumentCreated {
    serde_json::from_value(json!({
        "document": { "id": format!("doc-{name}"), "name": name },
        "batch": "batch-1"
    }))
    .unwrap()
}

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        create_dir_all(path.parent().unwrap()).unwrap();
        write(path, content).unwrap();
    }
}

#[tokio::test]
async fn test_uploads_every_file_into_single_dataset() {
    let tmp = tempdir().unwrap();
    write_tree(
        tmp.path(),
        &[("a.txt", "alpha"), ("b.md", "# beta"), ("src/c.rs", "fn c() {}")],
    );

    let mut api = MockDatasetApi::new();
    api.expect_create_dataset()
        .times(1)
        .returning(|req| Ok(dataset("ds-1", &req.name)));
    api.expect_create_document_by_text()
        .times(3)
        .withf(|dataset_id: &str, _req: &CreateDocumentByTextRequest| dataset_id == "ds-1")
        .returning(|_dataset_id: &str, req: CreateDocumentByTextRequest| Ok(created(&req.name)));

    let report = upload_directory(&api, &options(tmp.path()), &SilentProgress)
        .await
        .expect("Upload should complete");

    assert_eq!(report.dataset.id, "ds-1");
    assert_eq!(report.attempted(), 3);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 0);
    assert_eq!(
        report.outcomes[2],
        UploadOutcome {
            path: "src/c.rs".into(),
            status: UploadStatus::Succeeded {
                document_id: "doc-src/c.rs".into(),
                batch: "batch-1".into(),
            },
        }
    );
}

#[tokio::test]
async fn test_submission_carries_path_content_and_default_processing() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &[("notes/readme.txt", "hello world")]);

    let seen: Arc<Mutex<Vec<CreateDocumentByTextRequest>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let mut api = MockDatasetApi::new();
    api.expect_create_dataset()
        .times(1)
        .withf(|req| req.name == "[test] upload" && req.description == "Uploaded by tests")
        .returning(|req| Ok(dataset("ds-9", &req.name)));
    api.expect_create_document_by_text()
        .returning(move |_dataset_id: &str, req: CreateDocumentByTextRequest| {
            let name = req.name.clone();
            sink.lock().unwrap().push(req);
            Ok(created(&name))
        });

    upload_directory(&api, &options(tmp.path()), &SilentProgress)
        .await
        .expect("Upload should complete");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let body = serde_json::to_value(&seen[0]).unwrap();
    assert_eq!(
        body,
        json!({
            "name": "notes/readme.txt",
            "text": "hello world",
            "indexing_technique": "high_quality",
            "doc_form": "text_model",
            "doc_language": "Korean",
            "process_rule": { "mode": "automatic" }
        })
    );
}

#[tokio::test]
async fn test_rejected_submission_is_recorded_and_run_continues() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &[("a.txt", "first"), ("b.txt", "second")]);

    let mut api = MockDatasetApi::new();
    api.expect_create_dataset()
        .times(1)
        .returning(|req| Ok(dataset("ds-1", &req.name)));
    api.expect_create_document_by_text()
        .times(2)
        .returning(|_dataset_id: &str, req: CreateDocumentByTextRequest| {
            if req.name == "b.txt" {
                Err(ApiError::Remote {
                    status: 400,
                    body: r#"{"code":"invalid_param"}"#.into(),
                })
            } else {
                Ok(created(&req.name))
            }
        });

    let report = upload_directory(&api, &options(tmp.path()), &SilentProgress)
        .await
        .expect("Partial failure must not abort the run");

    assert_eq!(report.attempted(), 2);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.path, "b.txt");
    match &failure.status {
        UploadStatus::Failed { stage, message } => {
            assert_eq!(*stage, FailureStage::Submit);
            assert!(message.contains("400"), "message was: {message}");
        }
        other => panic!("Expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failures_in_the_middle_never_short_circuit() {
    let tmp = tempdir().unwrap();
    write_tree(
        tmp.path(),
        &[("1.txt", "1"), ("2.txt", "2"), ("3.txt", "3"), ("4.txt", "4"), ("5.txt", "5")],
    );
    // Invalid UTF-8 cannot be read as text.
    write(tmp.path().join("3.txt"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

    let mut api = MockDatasetApi::new();
    api.expect_create_dataset()
        .times(1)
        .returning(|req| Ok(dataset("ds-1", &req.name)));
    api.expect_create_document_by_text()
        .times(4)
        .returning(|_dataset_id: &str, req: CreateDocumentByTextRequest| {
            if req.name == "1.txt" {
                Err(ApiError::Validation("nope".into()))
            } else {
                Ok(created(&req.name))
            }
        });

    let report = upload_directory(&api, &options(tmp.path()), &SilentProgress)
        .await
        .unwrap();

    assert_eq!(report.attempted(), 5);
    assert_eq!(report.failed(), 2);
    assert_eq!(report.succeeded(), 3);
    let stages: Vec<_> = report
        .failures()
        .map(|o| match &o.status {
            UploadStatus::Failed { stage, .. } => (o.path.as_str(), *stage),
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(
        stages,
        vec![("1.txt", FailureStage::Submit), ("3.txt", FailureStage::Read)]
    );
}

#[tokio::test]
async fn test_dataset_creation_failure_submits_nothing() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &[("a.txt", "alpha")]);

    let mut api = MockDatasetApi::new();
    api.expect_create_dataset().times(1).returning(|_| {
        Err(ApiError::Remote {
            status: 401,
            body: "unauthorized".into(),
        })
    });
    api.expect_create_document_by_text().never();

    let err = upload_directory(&api, &options(tmp.path()), &SilentProgress)
        .await
        .unwrap_err();

    assert!(
        matches!(err, UploadError::CreateDataset(ApiError::Remote { status: 401, .. })),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn test_missing_root_aborts_after_dataset_creation() {
    let tmp = tempdir().unwrap();
    let missing = tmp.path().join("nope");

    let mut api = MockDatasetApi::new();
    api.expect_create_dataset()
        .times(1)
        .returning(|req| Ok(dataset("ds-1", &req.name)));
    api.expect_create_document_by_text().never();

    let err = upload_directory(&api, &options(&missing), &SilentProgress)
        .await
        .unwrap_err();

    assert!(
        matches!(err, UploadError::Scan(ScanError::NotFound { .. })),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn test_empty_directory_creates_dataset_with_no_documents() {
    let tmp = tempdir().unwrap();

    let mut api = MockDatasetApi::new();
    api.expect_create_dataset()
        .times(1)
        .returning(|req| Ok(dataset("ds-empty", &req.name)));
    api.expect_create_document_by_text().never();

    let report = upload_directory(&api, &options(tmp.path()), &SilentProgress)
        .await
        .unwrap();

    assert_eq!(report.dataset.id, "ds-empty");
    assert_eq!(report.attempted(), 0);
    assert_eq!(report.succeeded(), 0);
    assert_eq!(report.failed(), 0);
}

#[tokio::test]
async fn test_excluded_paths_are_never_submitted() {
    let tmp = tempdir().unwrap();
    write_tree(
        tmp.path(),
        &[
            ("index.ts", "export {}"),
            (".git/HEAD", "ref: refs/heads/main"),
            ("node_modules/left-pad/index.js", "module.exports = 1"),
            ("dist/index.js", "compiled"),
            ("yarn.lock", "lock"),
        ],
    );

    let names = Arc::new(Mutex::new(Vec::new()));
    let sink = names.clone();

    let mut api = MockDatasetApi::new();
    api.expect_create_dataset()
        .returning(|req| Ok(dataset("ds-1", &req.name)));
    api.expect_create_document_by_text()
        .returning(move |_dataset_id: &str, req: CreateDocumentByTextRequest| {
            sink.lock().unwrap().push(req.name.clone());
            Ok(created(&req.name))
        });

    let mut opts = options(tmp.path());
    opts.exclude = vec![r"\.lock$".into()];
    upload_directory(&api, &opts, &SilentProgress).await.unwrap();

    assert_eq!(*names.lock().unwrap(), vec!["index.ts".to_string()]);
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl Progress for RecordingProgress {
    fn files_found(&self, count: usize) {
        self.events.lock().unwrap().push(format!("found {count}"));
    }

    fn file_finished(&self, outcome: &UploadOutcome) {
        let status = if outcome.is_success() { "ok" } else { "failed" };
        self.events
            .lock()
            .unwrap()
            .push(format!("{} {status}", outcome.path));
    }

    fn completed(&self, report: &dify_upload::upload::UploadReport) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {}/{}", report.succeeded(), report.attempted()));
    }
}

#[tokio::test]
async fn test_progress_is_reported_after_each_file() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &[("a.txt", "a"), ("b.txt", "b")]);

    let mut api = MockDatasetApi::new();
    api.expect_create_dataset()
        .returning(|req| Ok(dataset("ds-1", &req.name)));
    api.expect_create_document_by_text()
        .returning(|_dataset_id: &str, req: CreateDocumentByTextRequest| {
            if req.name == "a.txt" {
                Err(ApiError::Validation("empty".into()))
            } else {
                Ok(created(&req.name))
            }
        });

    let progress = RecordingProgress::default();
    upload_directory(&api, &options(tmp.path()), &progress)
        .await
        .unwrap();

    assert_eq!(
        *progress.events.lock().unwrap(),
        vec!["found 2", "a.txt failed", "b.txt ok", "done 1/2"]
    );
}

#[tokio::test]
async fn test_cleanup_deletes_matching_datasets_across_pages() {
    let mut api = MockDatasetApi::new();
    api.expect_list_datasets()
        .with(eq(1), eq(100))
        .times(1)
        .returning(|page, limit| {
            Ok(DatasetPage {
                data: vec![dataset("t1", "[test] one"), dataset("keep", "production")],
                has_more: true,
                limit,
                total: 3,
                page,
            })
        });
    api.expect_list_datasets()
        .with(eq(2), eq(100))
        .times(1)
        .returning(|page, limit| {
            Ok(DatasetPage {
                data: vec![dataset("t2", "[test] two")],
                has_more: false,
                limit,
                total: 3,
                page,
            })
        });
    api.expect_delete_dataset()
        .times(2)
        .withf(|id: &str| id == "t1" || id == "t2")
        .returning(|_id: &str| Ok(()));

    let deleted = cleanup_datasets(&api, "[test]").await.unwrap();

    assert_eq!(deleted, vec!["t1".to_string(), "t2".to_string()]);
}

#[tokio::test]
async fn test_cleanup_refuses_empty_prefix() {
    let mut api = MockDatasetApi::new();
    api.expect_list_datasets().never();
    api.expect_delete_dataset().never();

    let err = cleanup_datasets(&api, "").await.unwrap_err();

    assert!(matches!(err, CleanupError::EmptyPrefix), "got: {err:?}");
}

#[tokio::test]
async fn test_cleanup_failure_reports_already_deleted_ids() {
    let mut api = MockDatasetApi::new();
    api.expect_list_datasets().times(1).returning(|page, limit| {
        Ok(DatasetPage {
            data: vec![
                dataset("t1", "[test] one"),
                dataset("t2", "[test] two"),
                dataset("t3", "[test] three"),
            ],
            has_more: false,
            limit,
            total: 3,
            page,
        })
    });
    api.expect_delete_dataset()
        .withf(|id: &str| id == "t1")
        .times(1)
        .returning(|_id: &str| Ok(()));
    api.expect_delete_dataset()
        .withf(|id: &str| id == "t2")
        .times(1)
        .returning(|_id: &str| {
            Err(ApiError::Remote {
                status: 500,
                body: "boom".into(),
            })
        });
    api.expect_delete_dataset()
        .withf(|id: &str| id == "t3")
        .never();

    let err = cleanup_datasets(&api, "[test]").await.unwrap_err();

    match &err {
        CleanupError::Delete { id, deleted, source } => {
            assert_eq!(id, "t2");
            assert_eq!(deleted, &vec!["t1".to_string()]);
            assert_eq!(source.status(), Some(500));
        }
        other => panic!("Expected Delete error, got {other:?}"),
    }
    assert!(err.to_string().contains("t1"));
}

#[tokio::test]
async fn test_cleanup_listing_failure_deletes_nothing() {
    let mut api = MockDatasetApi::new();
    api.expect_list_datasets().times(1).returning(|_, _| {
        Err(ApiError::Remote {
            status: 401,
            body: "unauthorized".into(),
        })
    });
    api.expect_delete_dataset().never();

    let err = cleanup_datasets(&api, "[test]").await.unwrap_err();

    assert!(
        matches!(err, CleanupError::List(ApiError::Remote { status: 401, .. })),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn test_hidden_files_are_never_submitted() {
    let tmp = tempdir().unwrap();
    write_tree(
        tmp.path(),
        &[
            (".env", "DIFY_API_TOKEN=dataset-secret"),
            (".github/ci.yml", "on: push"),
            ("a.txt", "alpha"),
        ],
    );

    let names = Arc::new(Mutex::new(Vec::new()));
    let sink = names.clone();

    let mut api = MockDatasetApi::new();
    api.expect_create_dataset()
        .returning(|req| Ok(dataset("ds-1", &req.name)));
    api.expect_create_document_by_text()
        .returning(move |_dataset_id: &str, req: CreateDocumentByTextRequest| {
            assert!(!req.text.contains("dataset-secret"));
            sink.lock().unwrap().push(req.name.clone());
            Ok(created(&req.name))
        });

    let report = upload_directory(&api, &options(tmp.path()), &SilentProgress)
        .await
        .unwrap();

    assert_eq!(report.attempted(), 1);
    assert_eq!(*names.lock().unwrap(), vec!["a.txt".to_string()]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_dangling_symlink_is_a_read_failure() {
    let tmp = tempdir().unwrap();
    write_tree(tmp.path(), &[("a.txt", "alpha")]);
    std::os::unix::fs::symlink(tmp.path().join("gone.txt"), tmp.path().join("b.txt")).unwrap();

    let mut api = MockDatasetApi::new();
    api.expect_create_dataset()
        .returning(|req| Ok(dataset("ds-1", &req.name)));
    api.expect_create_document_by_text()
        .times(1)
        .returning(|_dataset_id: &str, req: CreateDocumentByTextRequest| Ok(created(&req.name)));

    let report = upload_directory(&api, &options(tmp.path()), &SilentProgress)
        .await
        .unwrap();

    assert_eq!(report.attempted(), 2);
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].path, "b.txt");
    assert!(matches!(
        failed[0].status,
        UploadStatus::Failed { stage: FailureStage::Read, .. }
    ));
}
