// =============================================================================
// Defo Console - API Client Module
// =============================================================================
// Table of Contents:
// 1. Submodules
// 2. Re-exports
// 3. API Client
// 4. Response Classification
// =============================================================================

pub mod datasets;
pub mod mock;
pub mod projects;
pub mod timestamp;
pub mod transport;

pub use datasets::*;
pub use mock::MockServer;
pub use projects::*;
pub use transport::{
    FetchTransport, FilePart, HttpRequest, HttpResponse, Method, MultipartForm, RequestBody,
    Transport, TransportError,
};

use std::rc::Rc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::config::{join_url, ConsoleConfig};
use crate::error::ApiError;
use crate::session::CredentialStore;

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Network(err.0)
    }
}

// -----------------------------------------------------------------------------
// 3. API Client
// -----------------------------------------------------------------------------

/// HTTP client for API requests.
///
/// Attaches the current bearer credential to every call and classifies the
/// outcome into an [`ApiError`].
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Rc<dyn Transport>,
    credentials: Rc<dyn CredentialStore>,
}

impl ApiClient {
    /// Create a new API client.
    pub fn new(
        base_url: impl Into<String>,
        transport: Rc<dyn Transport>,
        credentials: Rc<dyn CredentialStore>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
            credentials,
        }
    }

    pub fn from_config(
        config: &ConsoleConfig,
        transport: Rc<dyn Transport>,
        credentials: Rc<dyn CredentialStore>,
    ) -> Self {
        Self::new(config.api_url.clone(), transport, credentials)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether a bearer credential is currently held.
    pub fn has_credential(&self) -> bool {
        self.credentials.token().is_some()
    }

    fn build_request(&self, method: Method, endpoint: &str, body: RequestBody) -> HttpRequest {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if let Some(token) = self.credentials.token() {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }

        HttpRequest {
            method,
            url: join_url(&self.base_url, endpoint),
            headers,
            body,
        }
    }

    /// Send a request and return the parsed JSON payload.
    pub async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: RequestBody,
    ) -> Result<Value, ApiError> {
        let request = self.build_request(method, endpoint, body);
        log::debug!("{} {} via {}", method, request.url, self.transport.name());

        let response = self.transport.send(request).await.map_err(|e| {
            log::warn!("{} {} failed before a response: {}", method, endpoint, e);
            ApiError::from(e)
        })?;

        classify(response)
    }

    /// Untyped call: `(method, path, body?) -> JSON`.
    pub async fn call(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let body = match body {
            Some(value) => RequestBody::Json(value.clone()),
            None => RequestBody::Empty,
        };
        self.send(method, endpoint, body).await
    }

    /// GET request.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let value = self.send(Method::Get, endpoint, RequestBody::Empty).await?;
        decode(value)
    }

    /// POST request with JSON body.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let value = self.send(Method::Post, endpoint, encode(body)?).await?;
        decode(value)
    }

    /// PUT request with JSON body.
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let value = self.send(Method::Put, endpoint, encode(body)?).await?;
        decode(value)
    }

    /// DELETE request; any success payload is discarded.
    pub async fn delete(&self, endpoint: &str) -> Result<(), ApiError> {
        self.send(Method::Delete, endpoint, RequestBody::Empty)
            .await
            .map(|_| ())
    }

    /// POST request with a multipart body.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        form: MultipartForm,
    ) -> Result<T, ApiError> {
        let value = self
            .send(Method::Post, endpoint, RequestBody::Multipart(form))
            .await?;
        decode(value)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("transport", &self.transport.name())
            .finish()
    }
}

fn encode<B: Serialize>(body: &B) -> Result<RequestBody, ApiError> {
    serde_json::to_value(body)
        .map(RequestBody::Json)
        .map_err(|e| ApiError::Deserialize(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Deserialize(e.to_string()))
}

// -----------------------------------------------------------------------------
// 4. Response Classification
// -----------------------------------------------------------------------------

/// Map a raw response onto the error taxonomy.
pub fn classify(response: HttpResponse) -> Result<Value, ApiError> {
    let HttpResponse { status, body } = response;
    match status {
        200..=299 => {
            if body.trim().is_empty() {
                Ok(Value::Null)
            } else {
                serde_json::from_str(&body).map_err(|e| ApiError::Deserialize(e.to_string()))
            }
        }
        401 => Err(ApiError::Unauthorized),
        400..=499 => Err(ApiError::Client {
            status,
            message: server_message(status, &body),
        }),
        500..=599 => Err(ApiError::Server {
            status,
            message: server_message(status, &body),
        }),
        _ => Err(ApiError::Network(format!("unexpected HTTP status {}", status))),
    }
}

/// Extract the server-supplied message from an error body.
///
/// Understands FastAPI's `{"detail": "..."}` and `{"detail": [{"msg": ...}]}`.
fn server_message(status: u16, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        match map.get("detail") {
            Some(Value::String(detail)) => return detail.clone(),
            Some(Value::Array(items)) => {
                if let Some(msg) = items
                    .iter()
                    .find_map(|item| item.get("msg").and_then(Value::as_str))
                {
                    return msg.to_string();
                }
            }
            _ => {}
        }
        if let Some(Value::String(message)) = map.get("message") {
            return message.clone();
        }
    }

    let text = body.trim();
    if text.is_empty() {
        format!("HTTP {}", status)
    } else {
        text.to_string()
    }
}
