//! Client configuration.

/// Production API root: origin plus the `/api` prefix.
pub const DEFAULT_BASE_URL: &str = "https://kraties13.pythonanywhere.com/api";

/// Environment variable that overrides the base URL.
pub const BASE_URL_ENV: &str = "TASKS_API_URL";

/// Fixed configuration for one `ApiClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Reads `TASKS_API_URL`, falling back to the production endpoint.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        match lookup(BASE_URL_ENV).filter(|url| !url.trim().is_empty()) {
            Some(url) => Self::new(url.trim()),
            None => Self::default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an endpoint path such as `tasks/` or `/tasks/7/`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
