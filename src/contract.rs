//! # contract: the dataset API seam
//!
//! This module defines the [`DatasetApi`] trait and the plain data types that
//! flow through it: dataset creation, listing and deletion, and creating a
//! document from raw text inside a dataset.
//!
//! ## Interface & Extensibility
//! - [`crate::client::DifyClient`] implements the trait over HTTP.
//! - The orchestrator in [`crate::upload`] only ever sees the trait, so tests
//!   drive it with the generated `MockDatasetApi`.
//! - All methods are async and return [`ApiError`].
//!
//! ## Wire format
//! Field names and enum spellings are fixed by the remote service. Request
//! structs serialize to exactly the JSON bodies it expects; response structs
//! decode leniently (unknown fields ignored, nullable fields optional).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Chunking/embedding strategy of a dataset or document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingTechnique {
    #[default]
    HighQuality,
    Economy,
}

/// Who can see a dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    #[default]
    OnlyMe,
    AllTeamMembers,
    PartialMembers,
}

/// Knowledge provider of a dataset. The service defaults to `vendor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Vendor,
    External,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocForm {
    /// Text is embedded directly.
    #[default]
    TextModel,
    /// Parent-child chunks.
    HierarchicalModel,
    /// Question-answer pairs.
    QaModel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum DocLanguage {
    English,
    Chinese,
    Japanese,
    #[default]
    Korean,
}

/// How submitted text is split into retrievable chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ProcessRule {
    #[default]
    Automatic,
    Custom { rules: CustomRules },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRules {
    #[serde(default)]
    pub pre_processing_rules: Vec<PreProcessingRule>,
    pub segmentation: Segmentation,
    /// `full-doc` or `paragraph`; only meaningful for hierarchical documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subchunk_segmentation: Option<Segmentation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreProcessingRule {
    pub id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segmentation {
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_overlap: Option<u32>,
}

fn default_separator() -> String {
    "\n".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMethod {
    HybridSearch,
    SemanticSearch,
    FullTextSearch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalModel {
    pub search_method: SearchMethod,
    pub reranking_enable: bool,
    pub reranking_mode: RerankingModel,
    pub top_k: u32,
    pub score_threshold_enabled: bool,
    pub score_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RerankingModel {
    pub reranking_provider_name: String,
    pub reranking_model_name: String,
}

/// Body of `POST /datasets`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateDatasetRequest {
    pub name: String,
    pub description: String,
    pub indexing_technique: IndexingTechnique,
    pub permission: Permission,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_knowledge_api_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_knowledge_id: Option<String>,
}

impl CreateDatasetRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("dataset name must not be empty".into()));
        }
        Ok(())
    }
}

/// Body of `POST /datasets/{id}/document/create-by-text`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateDocumentByTextRequest {
    /// Document name; the uploader uses the file's path relative to the root.
    pub name: String,
    pub text: String,
    pub indexing_technique: IndexingTechnique,
    pub doc_form: DocForm,
    pub doc_language: DocLanguage,
    pub process_rule: ProcessRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieval_model: Option<RetrievalModel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model_provider: Option<String>,
}

impl CreateDocumentByTextRequest {
    /// Rejects submissions the service would refuse anyway: an empty name or
    /// blank text.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("document name must not be empty".into()));
        }
        if self.text.trim().is_empty() {
            return Err(ApiError::Validation(format!(
                "document {:?} has no text content",
                self.name
            )));
        }
        Ok(())
    }
}

/// A dataset (knowledge base) as returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub provider: Option<String>,
    pub permission: Option<String>,
    pub data_source_type: Option<String>,
    pub indexing_technique: Option<String>,
    #[serde(default)]
    pub app_count: u64,
    #[serde(default)]
    pub document_count: u64,
    #[serde(default)]
    pub word_count: u64,
    pub created_by: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub embedding_model: Option<String>,
    pub embedding_model_provider: Option<String>,
    pub embedding_available: Option<bool>,
    pub doc_form: Option<String>,
}

/// One page of `GET /datasets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetPage {
    #[serde(default)]
    pub data: Vec<Dataset>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub position: u64,
    #[serde(default)]
    pub name: String,
    pub data_source_type: Option<String>,
    pub indexing_status: Option<String>,
    pub display_status: Option<String>,
    pub created_from: Option<String>,
    pub created_at: Option<i64>,
    #[serde(default)]
    pub tokens: u64,
    #[serde(default)]
    pub word_count: u64,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub archived: bool,
    pub doc_form: Option<String>,
}

/// Response of document creation: the document and the indexing batch id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentCreated {
    pub document: Document,
    pub batch: String,
}

/// Trait for managing datasets and their documents on the remote service.
///
/// Every call maps to exactly one request; implementors must not retry or
/// cache.
#[cfg_attr(any(test, feature = "test-export-mocks"), mockall::automock)]
#[async_trait]
pub trait DatasetApi: Send + Sync {
    /// Create a new, empty dataset.
    async fn create_dataset(&self, req: CreateDatasetRequest) -> Result<Dataset, ApiError>;

    /// Fetch one page of datasets (pages start at 1).
    async fn list_datasets(&self, page: u32, limit: u32) -> Result<DatasetPage, ApiError>;

    /// Delete a dataset. Deleting a dataset that no longer exists succeeds.
    async fn delete_dataset(&self, dataset_id: &str) -> Result<(), ApiError>;

    /// Create a document inside `dataset_id` from raw text.
    async fn create_document_by_text(
        &self,
        dataset_id: &str,
        req: CreateDocumentByTextRequest,
    ) -> Result<DocumentCreated, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document_request(process_rule: ProcessRule) -> CreateDocumentByTextRequest {
        CreateDocumentByTextRequest {
            name: "src/main.rs".into(),
            text: "fn main() {}".into(),
            indexing_technique: IndexingTechnique::HighQuality,
            doc_form: DocForm::TextModel,
            doc_language: DocLanguage::Korean,
            process_rule,
            retrieval_model: None,
            embedding_model: None,
            embedding_model_provider: None,
        }
    }

    #[test]
    fn document_request_uses_service_field_names() {
        let body = serde_json::to_value(document_request(ProcessRule::Automatic)).unwrap();
        assert_eq!(
            body,
            json!({
                "name": "src/main.rs",
                "text": "fn main() {}",
                "indexing_technique": "high_quality",
                "doc_form": "text_model",
                "doc_language": "Korean",
                "process_rule": { "mode": "automatic" }
            })
        );
    }

    #[test]
    fn custom_process_rule_nests_rules_under_mode() {
        let rule = ProcessRule::Custom {
            rules: CustomRules {
                pre_processing_rules: vec![PreProcessingRule {
                    id: "remove_extra_spaces".into(),
                    enabled: true,
                }],
                segmentation: Segmentation {
                    separator: "###".into(),
                    max_tokens: 500,
                    chunk_overlap: None,
                },
                parent_mode: None,
                subchunk_segmentation: None,
            },
        };
        let body = serde_json::to_value(document_request(rule)).unwrap();
        assert_eq!(
            body["process_rule"],
            json!({
                "mode": "custom",
                "rules": {
                    "pre_processing_rules": [{ "id": "remove_extra_spaces", "enabled": true }],
                    "segmentation": { "separator": "###", "max_tokens": 500 }
                }
            })
        );
    }

    #[test]
    fn dataset_request_omits_absent_provider_fields() {
        let req = CreateDatasetRequest {
            name: "docs".into(),
            description: "d".into(),
            indexing_technique: IndexingTechnique::Economy,
            permission: Permission::AllTeamMembers,
            provider: None,
            external_knowledge_api_id: None,
            external_knowledge_id: None,
        };
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            json!({
                "name": "docs",
                "description": "d",
                "indexing_technique": "economy",
                "permission": "all_team_members"
            })
        );
    }

    #[test]
    fn validation_rejects_blank_text() {
        let mut req = document_request(ProcessRule::Automatic);
        req.text = "  \n".into();
        assert!(matches!(req.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn dataset_decodes_with_nulls_and_unknown_fields() {
        let dataset: Dataset = serde_json::from_value(json!({
            "id": "ds-1",
            "name": "docs",
            "description": null,
            "indexing_technique": "high_quality",
            "document_count": 0,
            "retrieval_model_dict": { "search_method": "semantic_search" },
            "tags": []
        }))
        .unwrap();
        assert_eq!(dataset.id, "ds-1");
        assert_eq!(dataset.description, None);
        assert_eq!(dataset.word_count, 0);
    }
}
