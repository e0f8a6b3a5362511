// =============================================================================
// Defo Console - Datasets API
// =============================================================================
// Table of Contents:
// 1. Types
// 2. Upload Validation
// 3. Datasets API Functions
// =============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{timestamp, ApiClient, FilePart, MultipartForm, ProjectId};
use crate::config::ConsoleConfig;
use crate::error::{StoreError, StoreResult};
use crate::utils::format_file_size;

// -----------------------------------------------------------------------------
// 1. Types
// -----------------------------------------------------------------------------

/// Server-assigned dataset identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(pub String);

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DatasetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Uploaded dataset metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub row_count: Option<u64>,
    #[serde(default)]
    pub column_count: Option<u64>,
    #[serde(with = "timestamp")]
    pub uploaded_at: DateTime<Utc>,
}

impl Dataset {
    /// Human-readable file size, or "-" when unknown.
    pub fn display_size(&self) -> String {
        self.file_size
            .map(format_file_size)
            .unwrap_or_else(|| "-".to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetList {
    #[serde(default)]
    pub datasets: Vec<Dataset>,
}

/// First rows of a dataset.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetPreview {
    pub columns: Vec<String>,
    pub preview: Vec<Map<String, Value>>,
    pub total_rows: u64,
    #[serde(default)]
    pub total_columns: Option<u64>,
}

/// Per-column summary computed server-side.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ColumnStatistics {
    Numeric {
        min: Option<f64>,
        max: Option<f64>,
        mean: Option<f64>,
        std: Option<f64>,
        count: u64,
    },
    Categorical {
        unique_count: u64,
        #[serde(default)]
        most_common: BTreeMap<String, u64>,
    },
}

/// Full dataset analysis.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetAnalysis {
    #[serde(default)]
    pub dataset_id: Option<DatasetId>,
    pub columns: Vec<String>,
    pub statistics: BTreeMap<String, ColumnStatistics>,
    #[serde(default)]
    pub time_series_data: Option<Vec<Map<String, Value>>>,
    pub total_rows: u64,
    pub total_columns: u64,
}

impl DatasetAnalysis {
    pub fn numeric_columns(&self) -> impl Iterator<Item = &str> {
        self.statistics.iter().filter_map(|(name, stats)| {
            matches!(stats, ColumnStatistics::Numeric { .. }).then_some(name.as_str())
        })
    }
}

// -----------------------------------------------------------------------------
// 2. Upload Validation
// -----------------------------------------------------------------------------

/// A file chosen for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetUpload {
    pub name: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl DatasetUpload {
    /// Check the upload against the console's policy before any network call.
    pub fn validate(&self, config: &ConsoleConfig) -> StoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::validation("Dataset name is required"));
        }
        if !config.accepts_extension(&self.file_name) {
            return Err(StoreError::validation(format!(
                "File type not supported. Allowed: {}",
                config.allowed_upload_extensions.join(", ")
            )));
        }
        if self.bytes.is_empty() {
            return Err(StoreError::validation("File is empty"));
        }
        if self.bytes.len() as u64 > config.max_upload_bytes {
            return Err(StoreError::validation(format!(
                "File is too large ({}); the limit is {}",
                format_file_size(self.bytes.len() as u64),
                format_file_size(config.max_upload_bytes)
            )));
        }
        Ok(())
    }

    fn into_form(self) -> MultipartForm {
        MultipartForm::new()
            .text("name", self.name.trim())
            .file(FilePart {
                field: "file".to_string(),
                file_name: self.file_name,
                content_type: self.content_type,
                bytes: self.bytes,
            })
    }
}

// -----------------------------------------------------------------------------
// 3. Datasets API Functions
// -----------------------------------------------------------------------------

/// List datasets attached to a project.
pub async fn list_datasets(client: &ApiClient, project_id: &ProjectId) -> StoreResult<Vec<Dataset>> {
    client
        .get::<DatasetList>(&format!("/projects/{}/datasets/", project_id))
        .await
        .map(|list| list.datasets)
        .map_err(|e| StoreError::from_api("Failed to load datasets", &e))
}

/// Validate and upload a dataset file.
pub async fn upload_dataset(
    client: &ApiClient,
    config: &ConsoleConfig,
    project_id: &ProjectId,
    upload: DatasetUpload,
) -> StoreResult<Dataset> {
    upload.validate(config)?;
    log::debug!("Uploading {} to project {}", upload.file_name, project_id);

    let dataset = client
        .upload::<Dataset>(
            &format!("/projects/{}/datasets/upload", project_id),
            upload.into_form(),
        )
        .await
        .map_err(|e| StoreError::from_api("Failed to upload dataset", &e))?;

    log::info!("Uploaded dataset {} ({})", dataset.id, dataset.display_size());
    Ok(dataset)
}

/// First rows plus column names.
pub async fn preview_dataset(client: &ApiClient, id: &DatasetId) -> StoreResult<DatasetPreview> {
    client
        .get(&format!("/datasets/{}/preview", id))
        .await
        .map_err(|e| StoreError::from_api("Failed to load preview", &e))
}

/// Column statistics and time series, if any.
pub async fn analyze_dataset(client: &ApiClient, id: &DatasetId) -> StoreResult<DatasetAnalysis> {
    client
        .get(&format!("/datasets/{}/analysis", id))
        .await
        .map_err(|e| StoreError::from_api("Failed to analyze dataset", &e))
}

pub async fn delete_dataset(client: &ApiClient, id: &DatasetId) -> StoreResult<()> {
    client
        .delete(&format!("/datasets/{}", id))
        .await
        .map_err(|e| StoreError::from_api("Failed to delete dataset", &e))
}
