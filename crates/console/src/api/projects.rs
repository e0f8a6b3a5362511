// =============================================================================
// Defo Console - Projects API
// =============================================================================
// Table of Contents:
// 1. Types
// 2. Request Types
// 3. Projects API Functions
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{timestamp, ApiClient};
use crate::error::ApiError;

// -----------------------------------------------------------------------------
// 1. Types
// -----------------------------------------------------------------------------

/// Server-assigned project identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ProjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Project lifecycle status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Paused,
    Completed,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Paused => "Paused",
            Self::Completed => "Completed",
        }
    }
}

/// A forecasting workspace, as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    /// Comma-delimited tags, stored as entered.
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Individual tags: split on commas, trimmed, empties dropped.
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags.as_deref().map(split_tags).unwrap_or_default()
    }
}

pub fn split_tags(tags: &str) -> Vec<&str> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// List envelope returned by `GET /projects/`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectList {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub total: Option<u64>,
}

// -----------------------------------------------------------------------------
// 2. Request Types
// -----------------------------------------------------------------------------

/// Fields a user supplies when creating a project.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDraft {
    pub name: String,
    pub description: String,
    pub tags: String,
}

impl ProjectDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }
}

/// Create project request.
#[derive(Debug, Serialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

impl From<&ProjectDraft> for CreateProjectRequest {
    fn from(draft: &ProjectDraft) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            name: draft.name.trim().to_string(),
            description: non_empty(&draft.description),
            tags: non_empty(&draft.tags),
        }
    }
}

/// Partial update; unset fields are left untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

impl ProjectPatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn status(mut self, status: ProjectStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// -----------------------------------------------------------------------------
// 3. Projects API Functions
// -----------------------------------------------------------------------------

/// List the caller's projects.
pub async fn list_projects(client: &ApiClient) -> Result<Vec<Project>, ApiError> {
    let list: ProjectList = client.get("/projects/").await?;
    Ok(list.projects)
}

/// Create a new project.
pub async fn create_project(client: &ApiClient, draft: &ProjectDraft) -> Result<Project, ApiError> {
    client
        .post("/projects/", &CreateProjectRequest::from(draft))
        .await
}

/// Update an existing project.
pub async fn update_project(
    client: &ApiClient,
    id: &ProjectId,
    patch: &ProjectPatch,
) -> Result<Project, ApiError> {
    client.put(&format!("/projects/{}", id), patch).await
}

/// Delete a project.
pub async fn delete_project(client: &ApiClient, id: &ProjectId) -> Result<(), ApiError> {
    client.delete(&format!("/projects/{}", id)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_decodes_backend_shape() {
        let raw = json!({
            "id": "7f0c",
            "name": "Q1 Demand",
            "description": null,
            "tags": "retail, us,,",
            "owner_id": "u1",
            "status": "paused",
            "created_at": "2024-03-01T09:30:00.123456",
            "updated_at": "2024-03-02T10:00:00"
        });
        let project: Project = serde_json::from_value(raw).unwrap();

        assert_eq!(project.id.as_str(), "7f0c");
        assert_eq!(project.status, ProjectStatus::Paused);
        assert_eq!(project.tag_list(), vec!["retail", "us"]);
        assert!(project.updated_at.is_some());
    }

    #[test]
    fn status_defaults_to_active() {
        let raw = json!({"id": "a", "name": "n", "created_at": "2024-01-01T00:00:00Z"});
        let project: Project = serde_json::from_value(raw).unwrap();
        assert_eq!(project.status, ProjectStatus::Active);
        assert!(project.tag_list().is_empty());
    }

    #[test]
    fn create_request_omits_empty_optionals() {
        let draft = ProjectDraft::new("  Q1 Demand ").tags("retail,us");
        let body = serde_json::to_value(CreateProjectRequest::from(&draft)).unwrap();
        assert_eq!(body, json!({"name": "Q1 Demand", "tags": "retail,us"}));
    }

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = ProjectPatch::default().status(ProjectStatus::Completed);
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"status": "completed"})
        );
        assert!(ProjectPatch::default().is_empty());
    }
}
