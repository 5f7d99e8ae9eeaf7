//! `load_config` module: resolves CLI flags, environment variables and an optional
//! YAML file into the [`UploadOptions`] of one run.
//!
//! Precedence, highest first: CLI flag, environment variable, YAML file,
//! built-in default. Secrets (the API token) are never read from the file.
//!
//! # Errors
//! Everything here fails with [`ConfigError`] before any network activity.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::cli::UploadArgs;
use crate::client::DEFAULT_TIMEOUT;
use crate::config::{
    DocumentSettings, UploadOptions, DEFAULT_BASE_URL, DEFAULT_DATASET_NAME, DEFAULT_DESCRIPTION,
};
use crate::contract::{
    DocForm, DocLanguage, IndexingTechnique, Permission, ProcessRule, Provider, RetrievalModel,
};
use crate::error::ConfigError;

pub const TOKEN_ENV: &str = "DIFY_API_TOKEN";
pub const BASE_URL_ENV: &str = "DIFY_BASE_URL";

/// Static settings file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    #[serde(default)]
    pub dataset: DatasetSection,
    #[serde(default)]
    pub document: DocumentSection,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetSection {
    pub name: Option<String>,
    pub description: Option<String>,
    pub permission: Option<Permission>,
    pub indexing_technique: Option<IndexingTechnique>,
    pub provider: Option<Provider>,
    pub external_knowledge_api_id: Option<String>,
    pub external_knowledge_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentSection {
    pub doc_form: Option<DocForm>,
    pub doc_language: Option<DocLanguage>,
    pub process_rule: Option<ProcessRule>,
    pub retrieval_model: Option<RetrievalModel>,
    pub embedding_model: Option<String>,
    pub embedding_model_provider: Option<String>,
}

pub fn load_file_config<P: AsRef<Path>>(path: P) -> Result<FileConfig, ConfigError> {
    let path = path.as_ref();
    info!(config_path = ?path, "Loading configuration from file");

    let content = fs::read_to_string(path).map_err(|source| {
        error!(error = ?source, config_path = ?path, "Failed to read config file");
        ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let config: FileConfig = serde_yaml::from_str(&content).map_err(|source| {
        error!(error = ?source, config_path = ?path, "Failed to parse config YAML");
        ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })?;
    info!(config_path = ?path, "Parsed config YAML successfully");
    Ok(config)
}

/// Token from the flag, else from `DIFY_API_TOKEN`. Blank values count as
/// missing.
pub fn resolve_token(flag: Option<&str>) -> Result<String, ConfigError> {
    if let Some(token) = flag.filter(|t| !t.trim().is_empty()) {
        return Ok(token.to_string());
    }
    match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => {
            info!("{TOKEN_ENV} found in env");
            Ok(token)
        }
        _ => {
            error!("API token missing: no --token and {TOKEN_ENV} not set");
            Err(ConfigError::MissingToken)
        }
    }
}

pub fn resolve_base_url(flag: Option<&str>, file: Option<&str>) -> Result<String, ConfigError> {
    let env = std::env::var(BASE_URL_ENV).ok().filter(|v| !v.trim().is_empty());
    let url = flag
        .map(str::to_string)
        .or(env)
        .or_else(|| file.map(str::to_string))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        error!(url = %url, "Base URL is not an http(s) URL");
        return Err(ConfigError::InvalidBaseUrl { url });
    }
    Ok(url.trim_end_matches('/').to_string())
}

pub fn resolve_timeout(flag: Option<u64>, file: Option<u64>) -> Duration {
    flag.or(file)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT)
}

/// Dataset name when none is configured: the root directory's own name.
fn default_dataset_name(root: &Path) -> String {
    let named = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            fs::canonicalize(root)
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        });
    named
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_DATASET_NAME.to_string())
}

/// Merges flags, environment and the optional YAML file into run options.
pub fn load_config(args: &UploadArgs) -> Result<UploadOptions, ConfigError> {
    let auth_token = resolve_token(args.token.as_deref())?;

    let file = match &args.config {
        Some(path) => load_file_config(path)?,
        None => FileConfig::default(),
    };

    let base_url = resolve_base_url(args.base_url.as_deref(), file.base_url.as_deref())?;
    let timeout = resolve_timeout(args.timeout_secs, file.timeout_secs);

    let dataset = file.dataset;
    let document = file.document;

    let dataset_name = args
        .name
        .clone()
        .or(dataset.name)
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| default_dataset_name(&args.dir));

    let document = DocumentSettings {
        indexing_technique: dataset.indexing_technique.unwrap_or_default(),
        doc_form: document.doc_form.unwrap_or_default(),
        doc_language: args
            .language
            .or(document.doc_language)
            .unwrap_or_default(),
        process_rule: document.process_rule.unwrap_or_default(),
        retrieval_model: document.retrieval_model,
        embedding_model: document.embedding_model,
        embedding_model_provider: document.embedding_model_provider,
    };

    let mut exclude = file.exclude;
    exclude.extend(args.exclude.iter().cloned());

    let options = UploadOptions {
        root_directory: args.dir.clone(),
        auth_token,
        base_url,
        dataset_name,
        description: dataset
            .description
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
        permission: dataset.permission.unwrap_or_default(),
        provider: args.provider.or(dataset.provider),
        external_knowledge_api_id: args
            .external_knowledge_api_id
            .clone()
            .or(dataset.external_knowledge_api_id),
        external_knowledge_id: args
            .external_knowledge_id
            .clone()
            .or(dataset.external_knowledge_id),
        document,
        exclude,
        timeout,
    };

    info!(
        base_url = %options.base_url,
        dataset_name = %options.dataset_name,
        "Config loaded and merged successfully"
    );
    Ok(options)
}
