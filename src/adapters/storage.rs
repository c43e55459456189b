use crate::domain::model::LocalArtifact;
use crate::domain::ports::ArtifactStore;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tokio::fs;

const PARTIAL_SUFFIX: &str = ".part";

static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// The static-content directory, one file per cache key.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    max_bytes: Option<u64>,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_bytes: None,
        }
    }

    /// Evict oldest artifacts once the directory grows past `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: Option<u64>) -> Self {
        self.max_bytes = max_bytes.filter(|&b| b > 0);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    fn temp_path(&self, key: &str) -> PathBuf {
        let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            ".{}.{}.{}{}",
            key,
            std::process::id(),
            seq,
            PARTIAL_SUFFIX
        ))
    }

    async fn evict_until_within(&self, limit: u64, keep: &Path) -> Result<()> {
        let mut entries: Vec<(PathBuf, u64, SystemTime)> = Vec::new();
        let mut total = 0u64;

        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(PARTIAL_SUFFIX) {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            total += meta.len();
            let path = entry.path();
            if path != keep {
                entries.push((path, meta.len(), meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)));
            }
        }

        if total <= limit {
            return Ok(());
        }

        entries.sort_by_key(|(_, _, modified)| *modified);
        for (path, len, _) in entries {
            if total <= limit {
                break;
            }
            match fs::remove_file(&path).await {
                Ok(()) => {
                    total = total.saturating_sub(len);
                    tracing::info!("Evicted cached artifact {}", path.display());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    total = total.saturating_sub(len);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if total > limit {
            tracing::warn!(
                "Artifact cache still holds {} bytes (limit {})",
                total,
                limit
            );
        }
        Ok(())
    }
}

async fn discard_partial(temp: &Path) {
    match fs::remove_file(temp).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove partial file {}: {}", temp.display(), e),
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn locate(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(fs::try_exists(self.locate(key)).await?)
    }

    async fn write_artifact(&self, key: &str, data: &[u8]) -> Result<LocalArtifact> {
        self.ensure_root().await?;

        let target = self.locate(key);
        let temp = self.temp_path(key);

        if let Err(e) = fs::write(&temp, data).await {
            discard_partial(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            discard_partial(&temp).await;
            return Err(e.into());
        }
        tracing::debug!("Stored {} bytes at {}", data.len(), target.display());

        if let Some(limit) = self.max_bytes {
            self.evict_until_within(limit, &target).await?;
        }

        Ok(LocalArtifact {
            key: key.to_string(),
            path: target,
        })
    }
}
