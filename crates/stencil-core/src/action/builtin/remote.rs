//! Actions reading through the resource stack

use super::filesystem::{already_exists, write_file};
use super::options_schema;
use crate::action::{parse_options, Action, ActionRunner, ActionSpec, Options};
use crate::context::ExecutionContext;
use crate::error::{ErrorReason, Help, WorkflowError};
use crate::stack::{directory_url, ResourceStack};
use crate::transport::Content;
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct DownloadOptions {
    source: String,
    destination: String,
    #[serde(default)]
    overwrite: bool,
}

/// `download`: fetch a file or directory and write it locally
///
/// `source` resolves against the context's base URL, so templates can ship
/// files next to their definition. A single file is written to
/// `destination`; a directory is written below it.
pub struct DownloadAction {
    resources: Arc<ResourceStack>,
}

impl DownloadAction {
    pub fn new(resources: Arc<ResourceStack>) -> Self {
        Self { resources }
    }

    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "download",
            "Copy a file or directory from a URL",
            options_schema(
                json!({
                    "source": {"type": "string"},
                    "destination": {"type": "string"},
                    "overwrite": {"type": "boolean"}
                }),
                &["source", "destination"],
            ),
        )
    }
}

/// Join a `/`-separated relative path below `root`, refusing to leave it
fn contained_path(root: &Path, relative: &str) -> Result<PathBuf, WorkflowError> {
    let mut path = root.to_path_buf();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => {
                return Err(WorkflowError::with_help(
                    format!("Refusing to write outside the destination: {}", relative),
                    Help::with_reason(ErrorReason::AccessDenied),
                ))
            }
        }
    }
    Ok(path)
}

#[async_trait]
impl Action for DownloadAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        _runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let options: DownloadOptions = parse_options("download", options)?;
        let url = context.resolve_url(&options.source)?;
        let destination = context.resolve_path(&options.destination);

        let resource = self.resources.fetch(&url).await?;
        let files = match resource.value {
            Content::File(bytes) => vec![(destination.clone(), bytes)],
            Content::Tree(entries) => entries
                .into_iter()
                .map(|(relative, bytes)| Ok((contained_path(&destination, &relative)?, bytes)))
                .collect::<Result<Vec<_>, WorkflowError>>()?,
        };

        if !options.overwrite {
            if let Some((existing, _)) = files.iter().find(|(path, _)| path.exists()) {
                return Err(already_exists(existing));
            }
        }

        debug!(url = %url, files = files.len(), "writing downloaded files");
        let results = join_all(
            files
                .iter()
                .map(|(path, bytes)| write_file(path, bytes)),
        )
        .await;
        results.into_iter().collect::<Result<Vec<_>, _>>()?;

        context.output().inform(&format!(
            "Downloaded {} file(s) to {}",
            files.len(),
            destination.display()
        ));
        Ok(())
    }
}

#[derive(Deserialize)]
struct ImportOptions {
    template: String,
    #[serde(default)]
    options: Map<String, Value>,
}

/// `import`: run another template in a child context
///
/// The child starts with no variables; its options come from `options` and
/// its own defaults. Relative references inside the imported template
/// resolve against the template's location.
pub struct ImportAction {
    resources: Arc<ResourceStack>,
}

impl ImportAction {
    pub fn new(resources: Arc<ResourceStack>) -> Self {
        Self { resources }
    }

    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "import",
            "Run another template",
            options_schema(
                json!({
                    "template": {"type": "string"},
                    "options": {"type": "object"}
                }),
                &["template"],
            ),
        )
    }
}

#[async_trait]
impl Action for ImportAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let ImportOptions { template, options } = parse_options("import", options)?;
        let url = context.resolve_url(&template)?;
        let resource = self.resources.template(&url).await?;
        let template = resource.value;

        if let Some(warning) = template.check_version(crate::VERSION) {
            warn!(template = %resource.url, "{}", warning);
            context.output().warn(&warning);
        }

        let mut child = context.child(directory_url(&resource.url));
        template.resolve_options(&options, &mut child).await?;
        debug!(template = %resource.url, actions = template.actions.len(), "running imported template");
        runner.run(&template.actions, &mut child).await
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Fixture;
    use super::*;
    use tempfile::TempDir;

    fn template_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("files/src")).unwrap();
        std::fs::write(dir.path().join("files/README.md"), "# Starter").unwrap();
        std::fs::write(dir.path().join("files/src/index.ts"), "export {}").unwrap();
        std::fs::write(
            dir.path().join("template.json"),
            json!({
                "version": "0.0.1",
                "options": {
                    "name": {"type": "string", "description": "Name", "required": true},
                    "greeting": {"type": "string", "description": "Greeting", "default": "hello ${name}"}
                },
                "actions": [
                    {"name": "download", "source": "files/", "destination": "${name}"},
                    {"name": "write-file", "path": "${name}/greeting.txt", "content": "${greeting}"}
                ]
            })
            .to_string(),
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_download_directory_and_file() {
        let source = template_dir();
        let mut fixture = Fixture::new();
        let base = url::Url::from_directory_path(source.path()).unwrap();

        fixture
            .run(json!([
                {"name": "download", "source": base.join("files/").unwrap().as_str(), "destination": "app"},
                {"name": "download", "source": base.join("files/README.md").unwrap().as_str(), "destination": "copy.md"}
            ]))
            .await
            .unwrap();

        let root = fixture.dir.path();
        assert_eq!(std::fs::read_to_string(root.join("app/README.md")).unwrap(), "# Starter");
        assert_eq!(std::fs::read_to_string(root.join("app/src/index.ts")).unwrap(), "export {}");
        assert_eq!(std::fs::read_to_string(root.join("copy.md")).unwrap(), "# Starter");
    }

    #[tokio::test]
    async fn test_download_checks_conflicts_before_writing() {
        let source = template_dir();
        let mut fixture = Fixture::new();
        std::fs::create_dir_all(fixture.dir.path().join("app/src")).unwrap();
        std::fs::write(fixture.dir.path().join("app/src/index.ts"), "mine").unwrap();
        let base = url::Url::from_directory_path(source.path()).unwrap();

        let error = fixture
            .run(json!([
                {"name": "download", "source": base.join("files/").unwrap().as_str(), "destination": "app"}
            ]))
            .await
            .unwrap_err();

        assert_eq!(error.reason(), Some(ErrorReason::PreconditionFailed));
        assert!(!fixture.dir.path().join("app/README.md").exists());
    }

    #[tokio::test]
    async fn test_missing_source_is_not_found() {
        let mut fixture = Fixture::new();
        let error = fixture
            .run(json!([{"name": "download", "source": "nothing-here.txt", "destination": "x"}]))
            .await
            .unwrap_err();
        assert_eq!(error.reason(), Some(ErrorReason::NotFound));
    }

    #[tokio::test]
    async fn test_import_runs_template_in_child_context() {
        let source = template_dir();
        let mut fixture = Fixture::new();
        fixture.context.set("outer", json!(true));
        let template = url::Url::from_directory_path(source.path()).unwrap();

        fixture
            .run(json!([{
                "name": "import",
                "template": template.as_str(),
                "options": {"name": "demo"}
            }]))
            .await
            .unwrap();

        let root = fixture.dir.path();
        assert!(root.join("demo/README.md").is_file());
        assert_eq!(
            std::fs::read_to_string(root.join("demo/greeting.txt")).unwrap(),
            "hello demo"
        );
        assert!(!fixture.context.contains("name"));
        assert!(fixture.context.contains("outer"));
    }

    #[tokio::test]
    async fn test_import_rejects_invalid_options() {
        let source = template_dir();
        let mut fixture = Fixture::new();
        let template = url::Url::from_directory_path(source.path()).unwrap();

        let error = fixture
            .run(json!([{"name": "import", "template": template.as_str()}]))
            .await
            .unwrap_err();
        assert_eq!(error.reason(), Some(ErrorReason::InvalidInput));
    }

    #[test]
    fn test_contained_path() {
        let root = Path::new("/out");
        assert_eq!(
            contained_path(root, "src/./main.rs").unwrap(),
            PathBuf::from("/out/src/main.rs")
        );
        assert!(contained_path(root, "../escape").is_err());
        assert!(contained_path(root, "/etc/passwd").is_err());
    }
}
