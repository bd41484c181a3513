use std::time::Duration;

/// Catalog of every family and its weights
pub const DEFAULT_METADATA_URL: &str = "https://fonts.google.com/metadata/fonts";

/// Legacy CSS API, which accepts `family=Name:weight`
pub const DEFAULT_CSS_URL: &str = "https://fonts.googleapis.com/css";

/// The CSS API picks font formats from the user agent; a desktop Chrome gets WOFF2 subsets.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/66.0.3359.139 Safari/537.36";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Endpoints and HTTP settings used by [`crate::FontsClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub metadata_url: String,
    pub css_url: String,
    pub user_agent: String,
    /// Per-request timeout, applied by the HTTP client
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            css_url: DEFAULT_CSS_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Point both endpoints at another host, keeping the default paths.
    ///
    /// Mostly useful for mirrors and local fixtures.
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            metadata_url: format!("{base}/metadata/fonts"),
            css_url: format!("{base}/css"),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_base_url() {
        let config = ClientConfig::with_base_url("http://127.0.0.1:8080/");
        assert_eq!(config.metadata_url, "http://127.0.0.1:8080/metadata/fonts");
        assert_eq!(config.css_url, "http://127.0.0.1:8080/css");
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }
}
