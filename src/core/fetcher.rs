use crate::domain::model::{LocalArtifact, RasterSource};
use crate::domain::ports::ArtifactStore;
use crate::utils::error::{Result, StatsError};
use reqwest::Client;

/// Fetch-once download cache keyed by URL basename.
pub struct ArtifactFetcher<S: ArtifactStore> {
    store: S,
    client: Client,
}

impl<S: ArtifactStore> ArtifactFetcher<S> {
    pub fn new(store: S) -> Self {
        Self::with_client(store, Client::new())
    }

    pub fn with_client(store: S, client: Client) -> Self {
        Self { store, client }
    }

    pub async fn fetch(&self, source: &RasterSource) -> Result<LocalArtifact> {
        let key = source.cache_key();

        if !source.refresh() && self.store.contains(key).await? {
            tracing::debug!("Cache hit for {}", key);
            return Ok(LocalArtifact {
                key: key.to_string(),
                path: self.store.locate(key),
            });
        }

        tracing::info!("Downloading COG from {}", source.url());
        let response = self.client.get(source.url()).send().await?;
        tracing::debug!("COG response status: {}", response.status());

        if !response.status().is_success() {
            return Err(StatsError::UpstreamFetchError {
                url: source.url().to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?;
        let artifact = self.store.write_artifact(key, &body).await?;
        tracing::info!(
            "Cached {} ({} bytes) at {}",
            key,
            body.len(),
            artifact.path.display()
        );
        Ok(artifact)
    }
}
