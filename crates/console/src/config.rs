// =============================================================================
// Defo Console - Configuration
// =============================================================================
// Table of Contents:
// 1. Defaults
// 2. Console Config
// =============================================================================

// -----------------------------------------------------------------------------
// 1. Defaults
// -----------------------------------------------------------------------------

pub const DEVELOPMENT_API_URL: &str = "http://localhost:8000";
pub const PRODUCTION_API_URL: &str = "https://api.defo.app";

/// localStorage key holding the bearer token.
pub const DEFAULT_TOKEN_KEY: &str = "token";

/// Upload cap enforced by the backend (50 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

pub const DEFAULT_UPLOAD_EXTENSIONS: [&str; 3] = [".csv", ".xlsx", ".xls"];

// -----------------------------------------------------------------------------
// 2. Console Config
// -----------------------------------------------------------------------------

/// Runtime configuration for the console client.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    /// API base URL, without trailing slash.
    pub api_url: String,

    /// Storage key for the bearer credential.
    pub token_key: String,

    /// Largest dataset file accepted before upload.
    pub max_upload_bytes: u64,

    /// Lower-case file extensions accepted for datasets, with leading dot.
    pub allowed_upload_extensions: Vec<String>,
}

impl ConsoleConfig {
    /// Build the config from compile-time environment.
    ///
    /// `DEFO_API_URL` wins; otherwise `DEFO_ENVIRONMENT=development` selects the
    /// local backend and anything else the production API.
    pub fn from_env() -> Self {
        let api_url = match option_env!("DEFO_API_URL") {
            Some(url) if !url.trim().is_empty() => url.to_string(),
            _ => {
                let environment = option_env!("DEFO_ENVIRONMENT").unwrap_or("production");
                if environment == "development" {
                    DEVELOPMENT_API_URL.to_string()
                } else {
                    PRODUCTION_API_URL.to_string()
                }
            }
        };

        Self::default().with_api_url(api_url)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_key(mut self, token_key: impl Into<String>) -> Self {
        self.token_key = token_key.into();
        self
    }

    /// Join the base URL with an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        join_url(&self.api_url, path)
    }

    /// Whether `file_name` carries an accepted dataset extension.
    pub fn accepts_extension(&self, file_name: &str) -> bool {
        let lower = file_name.to_ascii_lowercase();
        match lower.rfind('.') {
            Some(dot) => self
                .allowed_upload_extensions
                .iter()
                .any(|ext| ext.as_str() == &lower[dot..]),
            None => false,
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            api_url: DEVELOPMENT_API_URL.to_string(),
            token_key: DEFAULT_TOKEN_KEY.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_upload_extensions: DEFAULT_UPLOAD_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
