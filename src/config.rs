use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use crate::contract::{
    CreateDatasetRequest, CreateDocumentByTextRequest, DocForm, DocLanguage, IndexingTechnique,
    Permission, ProcessRule, Provider, RetrievalModel,
};

pub const DEFAULT_BASE_URL: &str = "https://api.dify.ai/v1";
pub const DEFAULT_DATASET_NAME: &str = "dify-knowledge-uploader";
pub const DEFAULT_DESCRIPTION: &str = "Uploaded by Dify Knowledge Uploader";

/// Everything one upload run needs. Immutable once resolved.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub root_directory: PathBuf,
    pub auth_token: String,
    pub base_url: String,
    pub dataset_name: String,
    pub description: String,
    pub permission: Permission,
    pub provider: Option<Provider>,
    pub external_knowledge_api_id: Option<String>,
    pub external_knowledge_id: Option<String>,
    pub document: DocumentSettings,
    /// Extra exclude patterns (regular expressions over the relative path).
    pub exclude: Vec<String>,
    pub timeout: Duration,
}

impl UploadOptions {
    pub fn trace_loaded(&self) {
        info!(
            root = %self.root_directory.display(),
            base_url = %self.base_url,
            dataset_name = %self.dataset_name,
            excludes = self.exclude.len(),
            "Loaded UploadOptions"
        );
        debug!(document = ?self.document, "Document settings");
    }

    pub fn dataset_request(&self) -> CreateDatasetRequest {
        CreateDatasetRequest {
            name: self.dataset_name.clone(),
            description: self.description.clone(),
            indexing_technique: self.document.indexing_technique,
            permission: self.permission,
            provider: self.provider,
            external_knowledge_api_id: self.external_knowledge_api_id.clone(),
            external_knowledge_id: self.external_knowledge_id.clone(),
        }
    }
}

/// Processing configuration applied identically to every submitted document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentSettings {
    pub indexing_technique: IndexingTechnique,
    pub doc_form: DocForm,
    pub doc_language: DocLanguage,
    pub process_rule: ProcessRule,
    pub retrieval_model: Option<RetrievalModel>,
    pub embedding_model: Option<String>,
    pub embedding_model_provider: Option<String>,
}

impl DocumentSettings {
    pub fn request(&self, name: &str, text: String) -> CreateDocumentByTextRequest {
        CreateDocumentByTextRequest {
            name: name.to_string(),
            text,
            indexing_technique: self.indexing_technique,
            doc_form: self.doc_form,
            doc_language: self.doc_language,
            process_rule: self.process_rule.clone(),
            retrieval_model: self.retrieval_model.clone(),
            embedding_model: self.embedding_model.clone(),
            embedding_model_provider: self.embedding_model_provider.clone(),
        }
    }
}
