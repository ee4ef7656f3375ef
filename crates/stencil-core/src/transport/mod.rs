//! Concrete transports fetching raw content by URL scheme
//!
//! - [`FileTransport`]: `file:` URLs, single files or whole directories
//! - [`HttpTransport`]: `http:` and `https:` URLs
//! - [`GithubTransport`]: `github://owner/repo/path` and `https://github.com/...`
//!   repository references, served from the repository archive
//!
//! Transports are [`ResourceProvider`](crate::resource::ResourceProvider)s of
//! [`Content`] and are combined with the composites in [`crate::resource`].

pub mod file;
pub mod github;
pub mod http;

use crate::error::ProviderError;
use crate::provider::ProviderResult;
use std::collections::BTreeMap;

pub use file::FileTransport;
pub use github::{GithubTransport, RepositoryReference};
pub use http::HttpTransport;

/// Raw payload produced by a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// A single file
    File(Vec<u8>),
    /// A directory listing: relative `/`-separated path to file bytes
    Tree(BTreeMap<String, Vec<u8>>),
}

impl Content {
    /// Bytes of a single file, or of `name` inside a tree
    pub fn file(&self, name: &str) -> Option<&[u8]> {
        match self {
            Content::File(bytes) => Some(bytes),
            Content::Tree(files) => files.get(name).map(Vec::as_slice),
        }
    }

    /// Flatten into `(relative path, bytes)` pairs; a single file gets `name`
    pub fn into_files(self, name: &str) -> Vec<(String, Vec<u8>)> {
        match self {
            Content::File(bytes) => vec![(name.to_string(), bytes)],
            Content::Tree(files) => files.into_iter().collect(),
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, Content::Tree(_))
    }
}

/// Decode bytes as UTF-8, naming the source on failure
pub fn decode_text(bytes: Vec<u8>, source: &str) -> ProviderResult<String> {
    String::from_utf8(bytes)
        .map_err(|e| ProviderError::failed_with(format!("{} is not valid UTF-8", source), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_file_lookup() {
        let single = Content::File(b"a".to_vec());
        assert_eq!(single.file("anything"), Some(&b"a"[..]));

        let tree = Content::Tree(BTreeMap::from([("src/main.rs".to_string(), b"fn".to_vec())]));
        assert_eq!(tree.file("src/main.rs"), Some(&b"fn"[..]));
        assert_eq!(tree.file("missing"), None);
        assert!(tree.is_tree());
    }

    #[test]
    fn test_into_files_names_single_file() {
        let files = Content::File(b"x".to_vec()).into_files("README.md");
        assert_eq!(files, vec![("README.md".to_string(), b"x".to_vec())]);
    }

    #[test]
    fn test_decode_text_rejects_invalid_utf8() {
        assert!(decode_text(vec![0xff, 0xfe], "blob").is_err());
        assert_eq!(decode_text(b"ok".to_vec(), "blob").unwrap(), "ok");
    }
}
