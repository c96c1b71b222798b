use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

/// Public mount point of the upload area.
pub const UPLOADS_PATH: &str = "/uploads";

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    fn public_url(&self, key: &str) -> String;
    /// Inverse of `public_url`; `None` for URLs outside this storage.
    fn key_from_url(&self, url: &str) -> Option<String>;
}

/// Upload area on the local filesystem, served under [`UPLOADS_PATH`].
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub async fn new(root: impl Into<PathBuf>, public_base_url: &str) -> anyhow::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("create upload dir {}", root.display()))?;
        Ok(Self {
            root,
            base_url: format!("{}{}", public_base_url.trim_end_matches('/'), UPLOADS_PATH),
        })
    }

    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        anyhow::ensure!(is_plain_key(key), "invalid object key {:?}", key);
        Ok(self.root.join(key))
    }
}

// Keys are flat file names; anything that could escape the root is refused.
fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key != "."
        && key != ".."
        && !key.contains(['/', '\\'])
        && !key.starts_with('.')
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        tracing::debug!(key, content_type, size = body.len(), "object stored");
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        let key = url.strip_prefix(&self.base_url)?.strip_prefix('/')?;
        is_plain_key(key).then(|| key.to_string())
    }
}
