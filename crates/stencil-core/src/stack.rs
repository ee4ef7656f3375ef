//! Resource stack assembled from [`RuntimeConfig`]
//!
//! ```text
//! Mapped(rules) -> Cached? -> Multi[File, Github, Http]
//! ```
//!
//! Templates are read through the same stack, then parsed, validated and
//! deserialized into a [`Template`].

use crate::config::RuntimeConfig;
use crate::error::{ErrorReason, Help, WorkflowError};
use crate::provider::{Cache, InMemoryCache, ProviderResult};
use crate::resource::{
    AdaptedProvider, BoxResourceProvider, CachedResourceProvider, MappedProvider, MultiProvider,
    Resource, ResourceProvider, SchemaValidator, UrlMapping, ValidatedProvider,
};
use crate::schema::Schema;
use crate::template::{template_document, Template};
use crate::transport::github::{DEFAULT_ARCHIVE_BASE, DEFAULT_RAW_BASE};
use crate::transport::{Content, FileTransport, GithubTransport, HttpTransport};
use std::path::Path;
use std::sync::Arc;
use url::Url;

type ContentCache = Arc<dyn Cache<Resource<Content>>>;

/// Content and template providers sharing one configuration
pub struct ResourceStack {
    content: BoxResourceProvider<Content>,
    templates: BoxResourceProvider<Template>,
}

fn invalid_config(message: String) -> WorkflowError {
    WorkflowError::with_help(message, Help::with_reason(ErrorReason::InvalidConfiguration))
}

impl ResourceStack {
    pub fn new(
        content: BoxResourceProvider<Content>,
        templates: BoxResourceProvider<Template>,
    ) -> Self {
        Self { content, templates }
    }

    pub fn from_config(config: &RuntimeConfig) -> Result<Self, WorkflowError> {
        let cache: Option<ContentCache> = config
            .cache
            .then(|| Arc::new(InMemoryCache::new()) as ContentCache);

        let github = Self::github_transport(config)?;
        let content = Self::content_stack(config, github.clone(), cache.clone())?;
        let raw = Self::content_stack(config, github, cache)?;

        let schema = Schema::compile(Template::schema())
            .map_err(|e| invalid_config(format!("Invalid template schema: {}", e)))?;
        let documents = AdaptedProvider::new(raw, template_document);
        let templates = ValidatedProvider::new(
            Box::new(documents),
            Box::new(SchemaValidator::<Template>::new(schema)),
        );

        Ok(Self::new(content, Box::new(templates)))
    }

    /// One GitHub transport for both stacks, so they share its archive cache
    fn github_transport(config: &RuntimeConfig) -> Result<GithubTransport, WorkflowError> {
        let github = GithubTransport::new(&config.user_agent, config.http_timeout())?;
        if config.github_archive_url.is_none() && config.github_raw_url.is_none() {
            return Ok(github);
        }
        let archive = host_url(config.github_archive_url.as_deref(), DEFAULT_ARCHIVE_BASE)?;
        let raw = host_url(config.github_raw_url.as_deref(), DEFAULT_RAW_BASE)?;
        Ok(github.with_hosts(archive, raw))
    }

    /// `Mapped(Cached?(Multi[File, Github, Http]))`
    fn content_stack(
        config: &RuntimeConfig,
        github: GithubTransport,
        cache: Option<ContentCache>,
    ) -> Result<BoxResourceProvider<Content>, WorkflowError> {
        let timeout = config.http_timeout();
        let transports: BoxResourceProvider<Content> = Box::new(MultiProvider::new(vec![
            Box::new(FileTransport::new()),
            Box::new(github),
            Box::new(HttpTransport::new(&config.user_agent, timeout)),
        ]));

        let transports: BoxResourceProvider<Content> = match cache {
            Some(cache) => Box::new(CachedResourceProvider::new(transports, cache)),
            None => transports,
        };

        let rules = config
            .mappings
            .iter()
            .map(|rule| {
                UrlMapping::try_from(rule).map_err(|e| {
                    invalid_config(format!("Invalid URL mapping '{}': {}", rule.pattern, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Box::new(MappedProvider::new(transports, rules)))
    }

    pub fn supports(&self, url: &Url) -> bool {
        self.content.supports(url)
    }

    /// Raw content at `url`
    pub async fn fetch(&self, url: &Url) -> ProviderResult<Resource<Content>> {
        self.content.get(url).await
    }

    /// Parsed and validated template at `url`
    pub async fn template(&self, url: &Url) -> ProviderResult<Resource<Template>> {
        self.templates.get(url).await
    }
}

fn host_url(configured: Option<&str>, default: &str) -> Result<Url, WorkflowError> {
    let value = configured.unwrap_or(default);
    Url::parse(value).map_err(|e| invalid_config(format!("Invalid host URL '{}': {}", value, e)))
}

/// Base URL for references relative to a template resource.
///
/// A resource whose last segment has no extension is a directory, so a
/// trailing `/` is added and relative references land inside it.
pub fn directory_url(url: &Url) -> Url {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    if last.is_empty() || Path::new(last).extension().is_some() {
        return url.clone();
    }

    let mut directory = url.clone();
    directory.set_path(&format!("{}/", url.path()));
    directory
}
