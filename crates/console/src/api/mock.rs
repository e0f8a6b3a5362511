//! In-memory backend for tests and offline demos.
//!
//! [`MockServer`] implements [`Transport`] by serving the console's HTTP
//! contract from memory: projects and datasets routes, bearer auth, UUID ids
//! and server-side timestamps. Tests can additionally
//!
//! - inject a failure for the next request ([`MockServer::fail_next`]),
//! - take the network down ([`MockServer::set_offline`]),
//! - hold a response until released ([`MockServer::hold_next`]) to choose the
//!   order in which concurrent completions arrive,
//! - inspect every request received ([`MockServer::requests`]).

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use chrono::Utc;
use futures::channel::oneshot;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::transport::{HttpRequest, HttpResponse, Method, RequestBody, Transport, TransportError};
use super::{Dataset, DatasetId, Project, ProjectId, ProjectStatus};

const MOCK_TOKEN: &str = "mock-token";
const PREVIEW_ROWS: usize = 5;

enum Injected {
    Status(u16, String),
    Unreachable(String),
    Garbage,
}

struct StoredDataset {
    project_id: ProjectId,
    meta: Dataset,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Releases a response held by [`MockServer::hold_next`].
pub struct Gate {
    sender: oneshot::Sender<()>,
}

impl Gate {
    pub fn release(self) {
        let _ = self.sender.send(());
    }
}

pub struct MockServer {
    token: String,
    projects: RefCell<Vec<Project>>,
    datasets: RefCell<Vec<StoredDataset>>,
    injected: RefCell<VecDeque<Injected>>,
    gates: RefCell<VecDeque<oneshot::Receiver<()>>>,
    offline: Cell<bool>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self {
            token: MOCK_TOKEN.to_string(),
            projects: RefCell::new(Vec::new()),
            datasets: RefCell::new(Vec::new()),
            injected: RefCell::new(VecDeque::new()),
            gates: RefCell::new(VecDeque::new()),
            offline: Cell::new(false),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// The only bearer token this server accepts.
    pub fn token(&self) -> &str {
        &self.token
    }

    // -- Fault injection ------------------------------------------------------

    /// Answer the next request with `status` and a FastAPI-style detail.
    pub fn fail_next(&self, status: u16, detail: impl Into<String>) {
        self.injected
            .borrow_mut()
            .push_back(Injected::Status(status, detail.into()));
    }

    /// Make the next request fail before any response.
    pub fn drop_next(&self, reason: impl Into<String>) {
        self.injected
            .borrow_mut()
            .push_back(Injected::Unreachable(reason.into()));
    }

    /// Answer the next request with a 200 whose body is not JSON.
    pub fn garble_next(&self) {
        self.injected.borrow_mut().push_back(Injected::Garbage);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.set(offline);
    }

    /// Hold the response to the next request until the gate is released.
    ///
    /// The response is computed when the request arrives; only its delivery
    /// is delayed. Gates apply to requests in arrival order.
    pub fn hold_next(&self) -> Gate {
        let (sender, receiver) = oneshot::channel();
        self.gates.borrow_mut().push_back(receiver);
        Gate { sender }
    }

    // -- Inspection -----------------------------------------------------------

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.projects.borrow().clone()
    }

    /// Create a project directly, as another client would.
    pub fn insert_project(&self, name: &str) -> Project {
        let project = new_project(name, None, None);
        self.projects.borrow_mut().push(project.clone());
        project
    }

    /// Remove a project directly, as another client would.
    pub fn remove_project(&self, id: &ProjectId) {
        self.projects.borrow_mut().retain(|p| &p.id != id);
    }

    // -- Routing --------------------------------------------------------------

    fn respond(&self, request: &HttpRequest) -> HttpResponse {
        if request.header("Authorization") != Some(format!("Bearer {}", self.token).as_str()) {
            return detail(401, "Could not validate credentials");
        }

        let path = path_of(&request.url);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match (request.method, segments.as_slice()) {
            (Method::Get, ["projects"]) => self.list_projects(),
            (Method::Post, ["projects"]) => self.create_project(&request.body),
            (Method::Get, ["projects", id]) => self.with_project(id, |p| ok(json!(p))),
            (Method::Put, ["projects", id]) => self.update_project(id, &request.body),
            (Method::Delete, ["projects", id]) => self.delete_project(id),
            (Method::Get, ["projects", id, "datasets"]) => self.list_datasets(id),
            (Method::Post, ["projects", id, "datasets", "upload"]) => {
                self.upload_dataset(id, &request.body)
            }
            (Method::Get, ["datasets", id, "preview"]) => self.preview_dataset(id),
            (Method::Get, ["datasets", id, "analysis"]) => self.analyze_dataset(id),
            (Method::Delete, ["datasets", id]) => self.delete_dataset(id),
            _ => detail(404, "Not Found"),
        }
    }

    fn list_projects(&self) -> HttpResponse {
        let projects = self.projects.borrow();
        ok(json!({ "projects": *projects, "total": projects.len() }))
    }

    fn with_project(&self, id: &str, f: impl FnOnce(&Project) -> HttpResponse) -> HttpResponse {
        match self.projects.borrow().iter().find(|p| p.id.as_str() == id) {
            Some(project) => f(project),
            None => detail(404, "Project not found"),
        }
    }

    fn create_project(&self, body: &RequestBody) -> HttpResponse {
        let Some(fields) = json_object(body) else {
            return detail(422, "Request body must be a JSON object");
        };
        let Some(name) = fields.get("name").and_then(Value::as_str) else {
            return unprocessable("field required");
        };

        let project = new_project(
            name,
            string_field(fields, "description"),
            string_field(fields, "tags"),
        );
        self.projects.borrow_mut().push(project.clone());
        ok(json!(project))
    }

    fn update_project(&self, id: &str, body: &RequestBody) -> HttpResponse {
        let Some(fields) = json_object(body) else {
            return detail(422, "Request body must be a JSON object");
        };

        let mut projects = self.projects.borrow_mut();
        let Some(project) = projects.iter_mut().find(|p| p.id.as_str() == id) else {
            return detail(404, "Project not found");
        };

        if let Some(name) = fields.get("name").and_then(Value::as_str) {
            project.name = name.to_string();
        }
        if fields.contains_key("description") {
            project.description = string_field(fields, "description");
        }
        if fields.contains_key("tags") {
            project.tags = string_field(fields, "tags");
        }
        if let Some(status) = fields.get("status") {
            match serde_json::from_value::<ProjectStatus>(status.clone()) {
                Ok(status) => project.status = status,
                Err(_) => return unprocessable("invalid status"),
            }
        }
        project.updated_at = Some(Utc::now());
        ok(json!(project))
    }

    fn delete_project(&self, id: &str) -> HttpResponse {
        let mut projects = self.projects.borrow_mut();
        let before = projects.len();
        projects.retain(|p| p.id.as_str() != id);
        if projects.len() == before {
            return detail(404, "Project not found");
        }
        self.datasets
            .borrow_mut()
            .retain(|d| d.project_id.as_str() != id);
        ok(json!({ "message": "Project deleted successfully" }))
    }

    fn list_datasets(&self, project_id: &str) -> HttpResponse {
        if !self.has_project(project_id) {
            return detail(404, "Project not found");
        }
        let stored = self.datasets.borrow();
        let datasets: Vec<&Dataset> = stored
            .iter()
            .filter(|d| d.project_id.as_str() == project_id)
            .map(|d| &d.meta)
            .collect();
        ok(json!({ "datasets": datasets }))
    }

    fn upload_dataset(&self, project_id: &str, body: &RequestBody) -> HttpResponse {
        if !self.has_project(project_id) {
            return detail(404, "Project not found");
        }
        let RequestBody::Multipart(form) = body else {
            return unprocessable("multipart body required");
        };
        let (Some(name), Some(file)) = (form.field("name"), form.file.as_ref()) else {
            return unprocessable("field required");
        };

        let text = String::from_utf8_lossy(&file.bytes);
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let columns: Vec<String> = match lines.next() {
            Some(header) => header.split(',').map(|c| c.trim().to_string()).collect(),
            None => return detail(400, "File is empty"),
        };
        if columns.len() < 2 {
            return detail(400, "File must have at least 2 columns");
        }
        let rows: Vec<Vec<String>> = lines
            .map(|l| l.split(',').map(|c| c.trim().to_string()).collect())
            .collect();
        if rows.is_empty() {
            return detail(400, "File is empty");
        }

        let meta = Dataset {
            id: DatasetId(Uuid::new_v4().to_string()),
            name: name.to_string(),
            file_size: Some(file.bytes.len() as u64),
            file_type: file
                .file_name
                .rsplit_once('.')
                .map(|(_, ext)| ext.to_ascii_lowercase()),
            row_count: Some(rows.len() as u64),
            column_count: Some(columns.len() as u64),
            uploaded_at: Utc::now(),
        };
        self.datasets.borrow_mut().push(StoredDataset {
            project_id: ProjectId::from(project_id),
            meta: meta.clone(),
            columns,
            rows,
        });
        ok(json!(meta))
    }

    fn preview_dataset(&self, id: &str) -> HttpResponse {
        self.with_dataset(id, |d| {
            let preview: Vec<Value> = d
                .rows
                .iter()
                .take(PREVIEW_ROWS)
                .map(|row| Value::Object(record(&d.columns, row)))
                .collect();
            ok(json!({
                "columns": d.columns,
                "preview": preview,
                "total_rows": d.rows.len(),
                "total_columns": d.columns.len(),
            }))
        })
    }

    fn analyze_dataset(&self, id: &str) -> HttpResponse {
        self.with_dataset(id, |d| {
            let mut statistics = Map::new();
            for (index, column) in d.columns.iter().enumerate() {
                let values: Vec<&str> = d
                    .rows
                    .iter()
                    .filter_map(|row| row.get(index).map(String::as_str))
                    .filter(|v| !v.is_empty())
                    .collect();
                statistics.insert(column.clone(), column_statistics(&values));
            }

            let time_series = d
                .columns
                .iter()
                .position(|c| {
                    let lower = c.to_ascii_lowercase();
                    lower.contains("date") || lower.contains("time")
                })
                .map(|index| {
                    let mut rows = d.rows.clone();
                    rows.sort_by(|a, b| a.get(index).cmp(&b.get(index)));
                    rows.iter()
                        .map(|row| Value::Object(record(&d.columns, row)))
                        .collect::<Vec<_>>()
                });

            ok(json!({
                "dataset_id": d.meta.id,
                "columns": d.columns,
                "statistics": statistics,
                "time_series_data": time_series,
                "total_rows": d.rows.len(),
                "total_columns": d.columns.len(),
            }))
        })
    }

    fn delete_dataset(&self, id: &str) -> HttpResponse {
        let mut datasets = self.datasets.borrow_mut();
        let before = datasets.len();
        datasets.retain(|d| d.meta.id.0 != id);
        if datasets.len() == before {
            return detail(404, "Dataset not found");
        }
        ok(json!({ "message": "Dataset deleted successfully" }))
    }

    fn has_project(&self, id: &str) -> bool {
        self.projects.borrow().iter().any(|p| p.id.as_str() == id)
    }

    fn with_dataset(
        &self,
        id: &str,
        f: impl FnOnce(&StoredDataset) -> HttpResponse,
    ) -> HttpResponse {
        match self.datasets.borrow().iter().find(|d| d.meta.id.0 == id) {
            Some(dataset) => f(dataset),
            None => detail(404, "Dataset not found"),
        }
    }
}

#[async_trait(?Send)]
impl Transport for MockServer {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(request.clone());
        let gate = self.gates.borrow_mut().pop_front();

        let outcome = if self.offline.get() {
            Err(TransportError("connection refused".to_string()))
        } else {
            let injected = self.injected.borrow_mut().pop_front();
            match injected {
                Some(Injected::Status(status, message)) => Ok(detail(status, &message)),
                Some(Injected::Unreachable(reason)) => Err(TransportError(reason)),
                Some(Injected::Garbage) => Ok(HttpResponse::new(200, "<html>502 Bad Gateway</html>")),
                None => Ok(self.respond(&request)),
            }
        };

        if let Some(gate) = gate {
            // A dropped Gate releases the response as well.
            let _ = gate.await;
        }
        outcome
    }

    fn name(&self) -> &str {
        "mock"
    }
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

fn new_project(name: &str, description: Option<String>, tags: Option<String>) -> Project {
    let now = Utc::now();
    Project {
        id: ProjectId(Uuid::new_v4().to_string()),
        name: name.to_string(),
        description,
        status: ProjectStatus::Active,
        tags,
        owner_id: Some("mock-user".to_string()),
        created_at: now,
        updated_at: Some(now),
    }
}

fn path_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = without_scheme
        .find('/')
        .map_or("/", |slash| &without_scheme[slash..]);
    path.split('?').next().unwrap_or(path)
}

fn json_object(body: &RequestBody) -> Option<&Map<String, Value>> {
    match body {
        RequestBody::Json(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

fn record(columns: &[String], row: &[String]) -> Map<String, Value> {
    columns
        .iter()
        .zip(row.iter())
        .map(|(c, v)| (c.clone(), Value::String(v.clone())))
        .collect()
}

fn column_statistics(values: &[&str]) -> Value {
    let numbers: Option<Vec<f64>> = values.iter().map(|v| v.parse::<f64>().ok()).collect();
    match numbers {
        Some(numbers) if !numbers.is_empty() => {
            let count = numbers.len() as f64;
            let mean = numbers.iter().sum::<f64>() / count;
            let std = if numbers.len() > 1 {
                let var = numbers.iter().map(|n| (n - mean).powi(2)).sum::<f64>() / (count - 1.0);
                Some(var.sqrt())
            } else {
                None
            };
            json!({
                "min": numbers.iter().cloned().fold(f64::INFINITY, f64::min),
                "max": numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                "mean": mean,
                "std": std,
                "count": numbers.len(),
            })
        }
        _ => {
            let mut counts: HashMap<&str, u64> = HashMap::new();
            for value in values {
                *counts.entry(*value).or_insert(0) += 1;
            }
            let mut ranked: Vec<(&str, u64)> = counts.iter().map(|(k, v)| (*k, *v)).collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            let most_common: BTreeMap<&str, u64> = ranked.into_iter().take(5).collect();
            json!({ "unique_count": counts.len(), "most_common": most_common })
        }
    }
}

fn ok(value: Value) -> HttpResponse {
    HttpResponse::json(200, &value)
}

fn detail(status: u16, message: &str) -> HttpResponse {
    HttpResponse::json(status, &json!({ "detail": message }))
}

fn unprocessable(message: &str) -> HttpResponse {
    HttpResponse::json(422, &json!({ "detail": [{ "loc": ["body"], "msg": message }] }))
}
