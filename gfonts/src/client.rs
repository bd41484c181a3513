//! HTTP access to the catalog, the CSS API, and the font files it references

use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING};
use url::Url;

use crate::{Catalog, ClientConfig, Error, FontKey, Result};

/// Encodings advertised to the CSS API; the HTTP client decodes all three.
pub const ACCEPTED_ENCODINGS: &str = "gzip, deflate, br";

/// Everything but the unreserved characters of RFC 3986; spaces become `%20`.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Thin wrapper around a configured `reqwest::Client`
#[derive(Debug, Clone)]
pub struct FontsClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl FontsClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .map_err(|e| Error::network("failed to create HTTP client", e))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Download and parse the family catalog.
    pub async fn fetch_catalog(&self) -> Result<Catalog> {
        tracing::info!(url = %self.config.metadata_url, "Fetching font catalog");
        let body = self.get(&self.config.metadata_url).await?;
        let catalog = Catalog::from_response_bytes(&body)?;
        tracing::info!("Catalog lists {} families", catalog.len());
        Ok(catalog)
    }

    /// Build `<css endpoint>?family=<family>:<weight>`.
    ///
    /// Without a weight the weight part is left empty and the server picks the default.
    pub fn css_url(&self, family: &str, weight: Option<&str>) -> Result<Url> {
        let family = utf8_percent_encode(family, QUERY_VALUE);
        let weight = utf8_percent_encode(weight.unwrap_or_default(), QUERY_VALUE);
        let raw = format!("{}?family={family}:{weight}", self.config.css_url);
        Url::parse(&raw).map_err(|e| Error::Value(format!("invalid CSS URL {raw:?}: {e}")))
    }

    /// Fetch the `@font-face` stylesheet for one family and weight.
    ///
    /// Compressed responses are decoded before the body is returned.
    pub async fn fetch_css(&self, family: &str, weight: Option<&str>) -> Result<Vec<u8>> {
        let url = self.css_url(family, weight)?;
        tracing::info!(%url, "Fetching stylesheet");

        let response = self
            .http
            .get(url.clone())
            .header(ACCEPT_ENCODING, ACCEPTED_ENCODINGS)
            .send()
            .await
            .map_err(|e| Error::network(format!("GET {url} failed"), e))?;

        if !response.status().is_success() {
            return Err(Error::status(url.as_str(), response.status()));
        }

        if let Some(encoding) = response.headers().get(CONTENT_ENCODING) {
            tracing::debug!(?encoding, "Stylesheet was not decoded by the client");
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::network(format!("failed to read body of {url}"), e))?;
        Ok(body.to_vec())
    }

    /// Download every subset, one request at a time, keeping key and URI order.
    ///
    /// The first failing request aborts the whole batch.
    pub async fn fetch_all(
        &self,
        sources: &IndexMap<FontKey, Vec<String>>,
    ) -> Result<IndexMap<FontKey, Vec<Vec<u8>>>> {
        let mut binaries = IndexMap::with_capacity(sources.len());
        for (key, uris) in sources {
            tracing::info!(%key, "Downloading {} subsets", uris.len());
            let mut subsets = Vec::with_capacity(uris.len());
            for uri in uris {
                subsets.push(self.get(uri).await?);
            }
            binaries.insert(key.clone(), subsets);
        }
        Ok(binaries)
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::network(format!("GET {url} failed"), e))?;

        if !response.status().is_success() {
            return Err(Error::status(url, response.status()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::network(format!("failed to read body of {url}"), e))?;
        tracing::debug!(%url, bytes = body.len(), "Downloaded");
        Ok(body.to_vec())
    }
}
