// =============================================================================
// Defo Console - HTTP Transport
// =============================================================================
// Table of Contents:
// 1. Request/Response Types
// 2. Transport Trait
// 3. Browser Transport (gloo-net)
// =============================================================================

use async_trait::async_trait;
use gloo_net::http::{Request, RequestBuilder};
use thiserror::Error;

// -----------------------------------------------------------------------------
// 1. Request/Response Types
// -----------------------------------------------------------------------------

/// HTTP verbs used by the console API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File part of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Multipart form: plain text fields plus at most one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    pub fields: Vec<(String, String)>,
    pub file: Option<FilePart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.file = Some(part);
        self
    }

    /// Look up a text field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Convert to a browser `FormData`, the file carried as a `Blob`.
    pub fn to_form_data(&self) -> Result<web_sys::FormData, TransportError> {
        let form = web_sys::FormData::new().map_err(js_error)?;
        for (name, value) in &self.fields {
            form.append_with_str(name, value).map_err(js_error)?;
        }

        if let Some(part) = &self.file {
            let bytes = js_sys::Uint8Array::from(part.bytes.as_slice());
            let parts = js_sys::Array::of1(&bytes);
            let options = web_sys::BlobPropertyBag::new();
            options.set_type(&part.content_type);
            let blob = web_sys::Blob::new_with_u8_array_sequence_and_options(&parts, &options)
                .map_err(js_error)?;
            form.append_with_blob_and_filename(&part.field, &blob, &part.file_name)
                .map_err(js_error)?;
        }

        Ok(form)
    }
}

/// Request body modes.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartForm),
}

/// Fully resolved outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response as seen by the client, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }
}

/// The request never produced a response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

fn js_error(value: wasm_bindgen::JsValue) -> TransportError {
    TransportError(format!("{:?}", value))
}

// -----------------------------------------------------------------------------
// 2. Transport Trait
// -----------------------------------------------------------------------------

/// Moves one request to the server and back.
///
/// Implementations only report failures where no response arrived; status
/// codes are classified by the client.
#[async_trait(?Send)]
pub trait Transport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;

    /// Transport name for logging.
    fn name(&self) -> &str;
}

// -----------------------------------------------------------------------------
// 3. Browser Transport (gloo-net)
// -----------------------------------------------------------------------------

/// `fetch`-backed transport for the browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchTransport;

impl FetchTransport {
    fn builder(method: Method, url: &str) -> RequestBuilder {
        match method {
            Method::Get => Request::get(url),
            Method::Post => Request::post(url),
            Method::Put => Request::put(url),
            Method::Patch => Request::patch(url),
            Method::Delete => Request::delete(url),
        }
    }
}

#[async_trait(?Send)]
impl Transport for FetchTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = Self::builder(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        // Multipart leaves Content-Type to the browser so the boundary is set.
        let prepared = match &request.body {
            RequestBody::Empty => builder.build(),
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(form) => builder.body(form.to_form_data()?),
        }
        .map_err(|e| TransportError(e.to_string()))?;

        let response = prepared
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }

    fn name(&self) -> &str {
        "fetch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_builder_keeps_fields_and_file() {
        let form = MultipartForm::new().text("name", "Weekly sales").file(FilePart {
            field: "file".into(),
            file_name: "sales.csv".into(),
            content_type: "text/csv".into(),
            bytes: b"date,units\n".to_vec(),
        });

        assert_eq!(form.field("name"), Some("Weekly sales"));
        assert_eq!(form.file.as_ref().map(|f| f.file_name.as_str()), Some("sales.csv"));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let request = HttpRequest {
            method: Method::Get,
            url: "http://api.test/projects/".into(),
            headers: vec![("Authorization".into(), "Bearer t".into())],
            body: RequestBody::Empty,
        };
        assert_eq!(request.header("authorization"), Some("Bearer t"));
        assert_eq!(request.method.to_string(), "GET");
    }
}
