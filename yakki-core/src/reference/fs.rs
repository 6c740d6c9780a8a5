//! File-system collaborator used by the reference caches

use crate::error::{Result, YakkiError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Read access to knowledge-source files
#[async_trait]
pub trait SourceFs: Send + Sync {
    /// Regular files directly inside `dir`, sorted by path
    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    /// Whole file as UTF-8 text
    async fn read_all(&self, path: &Path) -> Result<String>;

    /// Last modification time
    async fn modified(&self, path: &Path) -> Result<SystemTime>;
}

/// [`SourceFs`] backed by the local disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl SourceFs for LocalFs {
    async fn list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut reader = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| YakkiError::io(dir, e))?;

        let mut files = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| YakkiError::io(dir, e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| YakkiError::io(entry.path(), e))?;
            if file_type.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_all(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| YakkiError::io(path, e))?;
        let text = String::from_utf8(bytes).map_err(|e| {
            YakkiError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })?;
        // Spreadsheet exports often carry a byte-order mark
        Ok(match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        })
    }

    async fn modified(&self, path: &Path) -> Result<SystemTime> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| YakkiError::io(path, e))?;
        metadata.modified().map_err(|e| YakkiError::io(path, e))
    }
}
