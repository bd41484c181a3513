//! Session-scoped state: one HTTP client and a catalog fetched at most once

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::{Catalog, ClientConfig, FontInstance, FontsClient, Result};

#[derive(Debug)]
pub struct Session {
    client: FontsClient,
    catalog: OnceCell<Arc<Catalog>>,
}

impl Session {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self::with_client(FontsClient::new(config)?))
    }

    pub fn with_client(client: FontsClient) -> Self {
        Self {
            client,
            catalog: OnceCell::new(),
        }
    }

    pub fn client(&self) -> &FontsClient {
        &self.client
    }

    /// The catalog, if it has been loaded
    pub fn catalog(&self) -> Option<Arc<Catalog>> {
        self.catalog.get().cloned()
    }

    /// Fetch the catalog on first use, then keep returning the same one.
    ///
    /// Concurrent callers wait for a single fetch. A failed fetch leaves the
    /// session empty so the next call tries again.
    pub async fn load_catalog(&self) -> Result<Arc<Catalog>> {
        let catalog = self
            .catalog
            .get_or_try_init(|| async { self.client.fetch_catalog().await.map(Arc::new) })
            .await?;
        Ok(Arc::clone(catalog))
    }

    /// Run the selection pipeline with this session's client.
    pub async fn load_selection(
        &self,
        family: &str,
        weight: Option<&str>,
    ) -> Result<Vec<FontInstance>> {
        crate::load_selection(&self.client, family, weight).await
    }
}
