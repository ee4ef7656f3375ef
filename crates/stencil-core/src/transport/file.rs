//! Local filesystem transport

use super::Content;
use crate::error::ProviderError;
use crate::provider::ProviderResult;
use crate::resource::{unsupported, Resource, ResourceProvider};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use url::Url;
use walkdir::WalkDir;

/// Reads `file:` URLs. Directories are returned as a [`Content::Tree`].
#[derive(Debug, Clone, Default)]
pub struct FileTransport;

impl FileTransport {
    pub fn new() -> Self {
        Self
    }

    fn path(url: &Url) -> ProviderResult<PathBuf> {
        url.to_file_path()
            .map_err(|_| ProviderError::failed(format!("Invalid file URL: {}", url)))
    }

    /// Collect every file below `root`, keyed by its `/`-separated relative path
    fn read_tree(root: &Path) -> ProviderResult<BTreeMap<String, Vec<u8>>> {
        let mut files = BTreeMap::new();

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| {
                ProviderError::failed_with(format!("Failed to list {}", root.display()), e)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| ProviderError::failed_with("Failed to relativize path", e))?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let contents = std::fs::read(entry.path()).map_err(|e| {
                ProviderError::failed_with(format!("Failed to read {}", entry.path().display()), e)
            })?;
            files.insert(key, contents);
        }

        Ok(files)
    }
}

#[async_trait]
impl ResourceProvider<Content> for FileTransport {
    fn supports(&self, url: &Url) -> bool {
        url.scheme() == "file"
    }

    async fn get(&self, url: &Url) -> ProviderResult<Resource<Content>> {
        if !self.supports(url) {
            return Err(unsupported(url));
        }
        let path = Self::path(url)?;

        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ProviderError::NotFound(format!(
                    "File not found: {}",
                    path.display()
                )))
            }
            Err(e) => {
                return Err(ProviderError::failed_with(
                    format!("Failed to access {}", path.display()),
                    e,
                ))
            }
        };

        let content = if metadata.is_dir() {
            debug!(path = %path.display(), "reading directory");
            let root = path.clone();
            let files = tokio::task::spawn_blocking(move || Self::read_tree(&root))
                .await
                .map_err(|e| ProviderError::failed_with("Directory listing was interrupted", e))??;
            Content::Tree(files)
        } else {
            let bytes = fs::read(&path).await.map_err(|e| {
                ProviderError::failed_with(format!("Failed to read {}", path.display()), e)
            })?;
            Content::File(bytes)
        };

        Ok(Resource::new(url.clone(), content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_single_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("template.json");
        std::fs::write(&path, "{}").unwrap();

        let url = Url::from_file_path(&path).unwrap();
        let resource = FileTransport::new().get(&url).await.unwrap();
        assert_eq!(resource.value, Content::File(b"{}".to_vec()));
    }

    #[tokio::test]
    async fn test_reads_directory_as_tree() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("README.md"), "hi").unwrap();
        std::fs::write(dir.path().join("src").join("main.rs"), "fn main() {}").unwrap();

        let url = Url::from_directory_path(dir.path()).unwrap();
        let resource = FileTransport::new().get(&url).await.unwrap();

        match resource.value {
            Content::Tree(files) => {
                let names: Vec<_> = files.keys().cloned().collect();
                assert_eq!(names, vec!["README.md", "src/main.rs"]);
            }
            other => panic!("expected a tree, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let url = Url::from_file_path(dir.path().join("nope.json")).unwrap();

        let error = FileTransport::new().get(&url).await.unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_other_schemes() {
        let url = Url::parse("https://example.com/a").unwrap();
        let transport = FileTransport::new();
        assert!(!transport.supports(&url));
        assert!(matches!(
            transport.get(&url).await.unwrap_err(),
            ProviderError::Unsupported(_)
        ));
    }
}
