//! # client: HTTP implementation of [`DatasetApi`]
//!
//! [`DifyClient`] talks JSON over HTTPS to the Dify knowledge API. It owns the
//! base URL and the API token and injects `Authorization: Bearer <token>` on
//! every request; callers only deal in the typed requests from
//! [`crate::contract`].
//!
//! Non-2xx responses become [`ApiError::Remote`] carrying the status code and
//! the raw body, so a failed upload can be explained to the user verbatim.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::UploadOptions;
use crate::contract::{
    CreateDatasetRequest, CreateDocumentByTextRequest, Dataset, DatasetApi, DatasetPage,
    DocumentCreated,
};
use crate::error::ApiError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct DifyClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl DifyClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.trim_end_matches('/').to_string();
        tracing::info!(
            base_url = %base_url,
            token_set = !token.is_empty(),
            timeout_secs = timeout.as_secs(),
            "Initialized DifyClient"
        );
        Ok(DifyClient {
            http,
            base_url,
            token: token.to_string(),
        })
    }

    pub fn from_options(options: &UploadOptions) -> Result<Self, ApiError> {
        Self::new(&options.base_url, &options.auth_token, options.timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String), ApiError> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let (status, body) = self.send(request).await?;
        if !status.is_success() {
            return Err(ApiError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl DatasetApi for DifyClient {
    async fn create_dataset(&self, req: CreateDatasetRequest) -> Result<Dataset, ApiError> {
        req.validate()?;
        tracing::info!(
            name = %req.name,
            indexing_technique = ?req.indexing_technique,
            permission = ?req.permission,
            "Creating dataset"
        );
        let request = self.http.post(self.url("/datasets")).json(&req);
        match self.send_json::<Dataset>(request).await {
            Ok(dataset) => {
                tracing::info!(dataset_id = %dataset.id, "Successfully created dataset");
                Ok(dataset)
            }
            Err(e) => {
                tracing::error!(error = %e, name = %req.name, "API error creating dataset");
                Err(e)
            }
        }
    }

    async fn list_datasets(&self, page: u32, limit: u32) -> Result<DatasetPage, ApiError> {
        tracing::debug!(page, limit, "Listing datasets");
        let request = self
            .http
            .get(self.url("/datasets"))
            .query(&[("page", page), ("limit", limit)]);
        let result = self.send_json::<DatasetPage>(request).await;
        match &result {
            Ok(listing) => tracing::debug!(
                count = listing.data.len(),
                has_more = listing.has_more,
                total = listing.total,
                "Fetched dataset page"
            ),
            Err(e) => tracing::error!(error = %e, page, "Failed to list datasets"),
        }
        result
    }

    async fn delete_dataset(&self, dataset_id: &str) -> Result<(), ApiError> {
        tracing::info!(dataset_id, "Deleting dataset");
        let request = self.http.delete(self.url(&format!("/datasets/{dataset_id}")));
        let (status, body) = self.send(request).await?;
        if status.is_success() || status == StatusCode::NOT_FOUND {
            tracing::info!(dataset_id, status = status.as_u16(), "Dataset deleted");
            return Ok(());
        }
        tracing::error!(dataset_id, status = status.as_u16(), "Failed to delete dataset");
        Err(ApiError::Remote {
            status: status.as_u16(),
            body,
        })
    }

    async fn create_document_by_text(
        &self,
        dataset_id: &str,
        req: CreateDocumentByTextRequest,
    ) -> Result<DocumentCreated, ApiError> {
        req.validate()?;
        tracing::debug!(
            dataset_id,
            name = %req.name,
            text_len = req.text.len(),
            "Creating document from text"
        );
        let request = self
            .http
            .post(self.url(&format!("/datasets/{dataset_id}/document/create-by-text")))
            .json(&req);
        match self.send_json::<DocumentCreated>(request).await {
            Ok(created) => {
                tracing::debug!(
                    document_id = %created.document.id,
                    batch = %created.batch,
                    "Document created"
                );
                Ok(created)
            }
            Err(e) => {
                tracing::warn!(error = %e, name = %req.name, "API error creating document");
                Err(e)
            }
        }
    }
}
