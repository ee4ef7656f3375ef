//! GitHub repository transport
//!
//! Repository references come in two shapes:
//! - `github://owner/repo[/path][?ref=R]`
//! - `https://github.com/owner/repo[/(tree|blob)/R[/path]]`
//!
//! A path whose last segment has a file extension is fetched as a single raw
//! file. Anything else downloads the repository zip archive and returns the
//! files below the path as a [`Content::Tree`].

use super::http::{build_client, fetch};
use super::Content;
use crate::error::ProviderError;
use crate::provider::{Cache, InMemoryCache, ProviderResult};
use crate::resource::{unsupported, Resource, ResourceProvider};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;
use zip::ZipArchive;

pub const DEFAULT_ARCHIVE_BASE: &str = "https://codeload.github.com/";
pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com/";
const DEFAULT_REF: &str = "HEAD";

/// Owner, repository, ref and subpath parsed from a repository URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReference {
    pub owner: String,
    pub repository: String,
    pub reference: Option<String>,
    /// `/`-separated path inside the repository, empty for the root
    pub path: String,
}

impl RepositoryReference {
    pub fn parse(url: &Url) -> Option<Self> {
        match url.scheme() {
            "github" => Self::parse_shorthand(url),
            "https" | "http" if url.host_str() == Some("github.com") => Self::parse_web(url),
            _ => None,
        }
    }

    fn parse_shorthand(url: &Url) -> Option<Self> {
        let owner = url.host_str().filter(|h| !h.is_empty())?.to_string();
        let mut segments = segments(url);
        if segments.is_empty() {
            return None;
        }
        let repository = segments.remove(0);
        let reference = url
            .query_pairs()
            .find(|(key, _)| key == "ref")
            .map(|(_, value)| value.into_owned());

        Some(Self {
            owner,
            repository: trim_git_suffix(repository),
            reference,
            path: segments.join("/"),
        })
    }

    fn parse_web(url: &Url) -> Option<Self> {
        let segments = segments(url);
        if segments.len() < 2 {
            return None;
        }
        let (reference, path) = match segments.get(2).map(String::as_str) {
            None => (None, String::new()),
            Some("tree") | Some("blob") => {
                let reference = segments.get(3)?.clone();
                (Some(reference), segments[4..].join("/"))
            }
            Some(_) => return None,
        };

        Some(Self {
            owner: segments[0].clone(),
            repository: trim_git_suffix(segments[1].clone()),
            reference,
            path,
        })
    }

    /// Whether the path names a single file rather than a directory
    pub fn is_file(&self) -> bool {
        Path::new(&self.path).extension().is_some()
    }

    fn reference(&self) -> &str {
        self.reference.as_deref().unwrap_or(DEFAULT_REF)
    }
}

fn segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|s| s.filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn trim_git_suffix(repository: String) -> String {
    match repository.strip_suffix(".git") {
        Some(trimmed) => trimmed.to_string(),
        None => repository,
    }
}

/// Append path segments to a base URL, keeping its query
fn build_url(base: &Url, parts: &[&str]) -> ProviderResult<Url> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| ProviderError::failed(format!("URL cannot have path segments: {}", base)))?;
        segments.pop_if_empty();
        for part in parts {
            for segment in part.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
        }
    }
    Ok(url)
}

/// Serves repository references from GitHub's archive and raw-file hosts.
///
/// Archives are kept per owner, repository and ref, so every subpath of one
/// pinned repository is served from a single download.
#[derive(Clone)]
pub struct GithubTransport {
    client: reqwest::Client,
    archive_base: Url,
    raw_base: Url,
    archives: Arc<InMemoryCache<Arc<Vec<u8>>>>,
}

impl GithubTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> ProviderResult<Self> {
        let archive_base = Url::parse(DEFAULT_ARCHIVE_BASE)
            .map_err(|e| ProviderError::failed_with("Invalid archive base URL", e))?;
        let raw_base = Url::parse(DEFAULT_RAW_BASE)
            .map_err(|e| ProviderError::failed_with("Invalid raw base URL", e))?;
        Ok(Self {
            client: build_client(user_agent, timeout),
            archive_base,
            raw_base,
            archives: Arc::new(InMemoryCache::new()),
        })
    }

    /// Point the transport at other archive and raw-file hosts
    pub fn with_hosts(mut self, archive_base: Url, raw_base: Url) -> Self {
        self.archive_base = archive_base;
        self.raw_base = raw_base;
        self
    }

    /// URL of the zip archive for the referenced commit-ish
    pub fn archive_url(&self, reference: &RepositoryReference) -> ProviderResult<Url> {
        build_url(
            &self.archive_base,
            &[
                &reference.owner,
                &reference.repository,
                "zip",
                reference.reference(),
            ],
        )
    }

    /// URL of the raw file the reference points to
    pub fn raw_url(&self, reference: &RepositoryReference) -> ProviderResult<Url> {
        build_url(
            &self.raw_base,
            &[
                &reference.owner,
                &reference.repository,
                reference.reference(),
                &reference.path,
            ],
        )
    }

    /// Repository archive bytes, downloaded once per owner, repository and ref
    async fn archive(&self, reference: &RepositoryReference) -> ProviderResult<Arc<Vec<u8>>> {
        let key = format!(
            "{}/{}@{}",
            reference.owner,
            reference.repository,
            reference.reference()
        );
        let archive = self.archive_url(reference)?;
        self.archives
            .get(
                &key,
                Box::pin(async move {
                    debug!(archive = %archive, "downloading repository archive");
                    fetch(&self.client, &archive).await.map(Arc::new)
                }),
            )
            .await
    }

    /// Extract archive entries below `subpath`, dropping the archive's top directory
    fn extract(zip_bytes: &[u8], subpath: &str) -> ProviderResult<BTreeMap<String, Vec<u8>>> {
        let mut archive = ZipArchive::new(Cursor::new(zip_bytes))
            .map_err(|e| ProviderError::failed_with("Failed to read repository archive", e))?;

        let prefix = if subpath.is_empty() {
            String::new()
        } else {
            format!("{}/", subpath.trim_end_matches('/'))
        };
        let mut files = BTreeMap::new();

        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| ProviderError::failed_with("Failed to read archive entry", e))?;
            if file.is_dir() {
                continue;
            }

            // Entries look like `{repo}-{ref}/path/to/file`
            let name = file.name().to_string();
            let Some((_, in_repository)) = name.split_once('/') else {
                continue;
            };
            let Some(relative) = in_repository.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if relative.is_empty() {
                continue;
            }

            let mut contents = Vec::new();
            file.read_to_end(&mut contents).map_err(|e| {
                ProviderError::failed_with(format!("Failed to extract {}", name), e)
            })?;
            files.insert(relative.to_string(), contents);
        }

        Ok(files)
    }
}

#[async_trait]
impl ResourceProvider<Content> for GithubTransport {
    fn supports(&self, url: &Url) -> bool {
        RepositoryReference::parse(url).is_some()
    }

    async fn get(&self, url: &Url) -> ProviderResult<Resource<Content>> {
        let Some(reference) = RepositoryReference::parse(url) else {
            return Err(unsupported(url));
        };

        if reference.is_file() {
            let raw = self.raw_url(&reference)?;
            let bytes = fetch(&self.client, &raw).await?;
            return Ok(Resource::new(url.clone(), Content::File(bytes)));
        }

        let bytes = self.archive(&reference).await?;
        debug!(url = %url, path = %reference.path, "extracting from repository archive");
        let files = Self::extract(&bytes, &reference.path)?;

        if files.is_empty() {
            return Err(ProviderError::NotFound(format!(
                "Path '{}' not found in {}/{}",
                reference.path, reference.owner, reference.repository
            )));
        }
        Ok(Resource::new(url.clone(), Content::Tree(files)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn parse(url: &str) -> Option<RepositoryReference> {
        RepositoryReference::parse(&Url::parse(url).unwrap())
    }

    fn archive(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
            let options = SimpleFileOptions::default();
            for (name, contents) in entries {
                zip.start_file(*name, options).unwrap();
                zip.write_all(contents.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buffer
    }

    async fn transport(server: &MockServer) -> GithubTransport {
        let base = Url::parse(&format!("{}/archive/", server.uri())).unwrap();
        let raw = Url::parse(&format!("{}/raw/", server.uri())).unwrap();
        GithubTransport::new("stencil-test", Duration::from_secs(5))
            .unwrap()
            .with_hosts(base, raw)
    }

    #[test]
    fn test_parse_shorthand() {
        let reference = parse("github://acme/templates/next/app?ref=v2").unwrap();
        assert_eq!(reference.owner, "acme");
        assert_eq!(reference.repository, "templates");
        assert_eq!(reference.reference.as_deref(), Some("v2"));
        assert_eq!(reference.path, "next/app");
        assert!(!reference.is_file());
    }

    #[test]
    fn test_parse_web_urls() {
        let root = parse("https://github.com/acme/templates").unwrap();
        assert_eq!(root.reference, None);
        assert_eq!(root.path, "");

        let file = parse("https://github.com/acme/templates/blob/main/next/template.json").unwrap();
        assert_eq!(file.reference.as_deref(), Some("main"));
        assert_eq!(file.path, "next/template.json");
        assert!(file.is_file());

        assert!(parse("https://github.com/acme/templates/issues/1").is_none());
        assert!(parse("https://gitlab.com/acme/templates").is_none());
        assert!(parse("github://acme").is_none());
    }

    #[tokio::test]
    async fn test_directory_is_extracted_from_archive() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/archive/acme/templates/zip/main"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(archive(&[
                ("templates-main/README.md", "root"),
                ("templates-main/next/template.json", "{}"),
                ("templates-main/next/files/index.ts", "export {}"),
            ])))
            .mount(&server)
            .await;

        let url = Url::parse("github://acme/templates/next?ref=main").unwrap();
        let resource = transport(&server).await.get(&url).await.unwrap();

        match resource.value {
            Content::Tree(files) => {
                let names: Vec<_> = files.keys().cloned().collect();
                assert_eq!(names, vec!["files/index.ts", "template.json"]);
            }
            other => panic!("expected a tree, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_archive_is_downloaded_once_per_ref() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/archive/acme/templates/zip/v2"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(archive(&[
                ("templates-v2/next/template.json", "{}"),
                ("templates-v2/next/files/index.ts", "export {}"),
                ("templates-v2/shared/README.md", "shared"),
            ])))
            .expect(1)
            .mount(&server)
            .await;
        let transport = transport(&server).await;

        for url in [
            "github://acme/templates/next?ref=v2",
            "github://acme/templates/next/files/?ref=v2",
            "github://acme/templates/shared?ref=v2",
        ] {
            let resource = transport.get(&Url::parse(url).unwrap()).await.unwrap();
            assert!(matches!(resource.value, Content::Tree(files) if !files.is_empty()));
        }
    }

    #[tokio::test]
    async fn test_file_path_uses_raw_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/raw/acme/templates/HEAD/next/template.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"actions\":[]}"))
            .mount(&server)
            .await;

        let url = Url::parse("github://acme/templates/next/template.json").unwrap();
        let resource = transport(&server).await.get(&url).await.unwrap();
        assert_eq!(resource.value, Content::File(b"{\"actions\":[]}".to_vec()));
    }

    #[tokio::test]
    async fn test_missing_subpath_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(archive(&[("templates-HEAD/README.md", "root")])),
            )
            .mount(&server)
            .await;

        let url = Url::parse("github://acme/templates/missing").unwrap();
        let error = transport(&server).await.get(&url).await.unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_repository_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse("github://acme/nothing").unwrap();
        let error = transport(&server).await.get(&url).await.unwrap_err();
        assert!(error.is_not_found());
    }
}
