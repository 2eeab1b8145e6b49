//! Where uncached assets come from

use std::path::{Component, Path, PathBuf};
use async_trait::async_trait;
use mime_guess::{mime, MimeGuess};
use tracing::debug;

/// A fetched static asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Origin for assets that are not cached
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Asset, String>;
}

/// Serves files from a directory on disk
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a request path inside the root, refusing to escape it
    fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let relative = path.trim_start_matches('/');
        let relative = if relative.is_empty() || relative.ends_with('/') {
            format!("{relative}index.html")
        } else {
            relative.to_string()
        };

        let relative = Path::new(&relative);
        if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(format!("Refusing to serve path outside asset root: {}", path));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AssetSource for DirectorySource {
    async fn fetch(&self, path: &str) -> Result<Asset, String> {
        let file = self.resolve(path)?;
        let bytes = tokio::fs::read(&file)
            .await
            .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;

        debug!("Read {} bytes from {}", bytes.len(), file.display());
        Ok(Asset {
            content_type: content_type_for(&file),
            bytes,
        })
    }
}

/// MIME type guessed from the file extension; text types are served as UTF-8
pub fn content_type_for(path: &Path) -> String {
    let mime = MimeGuess::from_path(path).first_or_octet_stream();
    if mime.type_() == mime::TEXT {
        format!("{}; charset=utf-8", mime.essence_str())
    } else {
        mime.essence_str().to_string()
    }
}
