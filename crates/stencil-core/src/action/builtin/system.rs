//! Actions handing work to external programs

use super::options_schema;
use crate::action::{parse_options, Action, ActionRunner, ActionSpec, Options};
use crate::context::ExecutionContext;
use crate::error::{ErrorReason, Help, WorkflowError};
use crate::package::PackageManager;
use crate::process::run_command;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

#[derive(Deserialize)]
struct RunOptions {
    command: String,
    #[serde(default)]
    arguments: Vec<String>,
    result: Option<String>,
}

/// `run`: execute a program in the working directory
///
/// With `result` the exit code is stored and a failure is left to the
/// template; without it a non-zero exit fails the action.
pub struct RunAction;

impl RunAction {
    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "run",
            "Run a command",
            options_schema(
                json!({
                    "command": {"type": "string", "minLength": 1},
                    "arguments": {"type": "array", "items": {"type": "string"}},
                    "result": {"type": "string", "minLength": 1}
                }),
                &["command"],
            ),
        )
    }
}

#[async_trait]
impl Action for RunAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        _runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let options: RunOptions = parse_options("run", options)?;
        let output = run_command(
            &options.command,
            &options.arguments,
            context.working_dir(),
            context.output().as_ref(),
        )
        .await?;

        if let Some(result) = options.result {
            context.set(result, json!(output.code));
            return Ok(());
        }
        if output.success() {
            return Ok(());
        }

        let mut help = Help::with_reason(ErrorReason::Other);
        for line in output.stderr.iter().rev().take(5).rev() {
            help = help.detail(line.clone());
        }
        Err(WorkflowError::with_help(
            format!(
                "Command `{}` exited with code {}",
                options.command, output.code
            ),
            help,
        ))
    }
}

#[derive(Deserialize)]
struct AddDependencyOptions {
    dependencies: Vec<String>,
    #[serde(default)]
    development: bool,
}

/// `add-dependency`: install packages with the project's package manager
pub struct AddDependencyAction {
    package_manager: Option<Arc<dyn PackageManager>>,
}

impl AddDependencyAction {
    pub fn new(package_manager: Option<Arc<dyn PackageManager>>) -> Self {
        Self { package_manager }
    }

    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "add-dependency",
            "Add packages to the project",
            options_schema(
                json!({
                    "dependencies": {
                        "type": "array",
                        "items": {"type": "string", "minLength": 1},
                        "minItems": 1
                    },
                    "development": {"type": "boolean"}
                }),
                &["dependencies"],
            ),
        )
    }
}

#[async_trait]
impl Action for AddDependencyAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        _runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let options: AddDependencyOptions = parse_options("add-dependency", options)?;
        let Some(package_manager) = &self.package_manager else {
            return Err(WorkflowError::with_help(
                "No package manager is available to add dependencies",
                Help::with_reason(ErrorReason::PreconditionFailed)
                    .detail(format!("dependencies: {}", options.dependencies.join(", "))),
            ));
        };

        debug!(
            package_manager = package_manager.name(),
            dependencies = ?options.dependencies,
            development = options.development,
            "adding dependencies"
        );
        package_manager
            .add_dependencies(
                context.working_dir(),
                &options.dependencies,
                options.development,
                context.output().as_ref(),
            )
            .await
    }
}

#[derive(Deserialize)]
struct OpenLinkOptions {
    url: String,
}

/// `open-link`: open a URL in the default browser
pub struct OpenLinkAction;

impl OpenLinkAction {
    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "open-link",
            "Open a link in the browser",
            options_schema(
                json!({"url": {"type": "string", "pattern": "^https?://"}}),
                &["url"],
            ),
        )
    }
}

#[async_trait]
impl Action for OpenLinkAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        _runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let OpenLinkOptions { url } = parse_options("open-link", options)?;
        context.output().inform(&format!("Opening {}", url));

        let target = url.clone();
        let opened = tokio::task::spawn_blocking(move || open::that(&target))
            .await
            .map_err(|e| WorkflowError::wrap(e, Help::default()))?;

        if let Err(e) = opened {
            // best effort, the URL was printed above
            debug!(error = %e, url = %url, "could not open browser");
            context
                .output()
                .warn(&format!("Could not open a browser. Visit {} manually.", url));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Fixture;
    use super::*;
    use crate::context::Output;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(Vec<String>, bool)>>,
    }

    #[async_trait]
    impl PackageManager for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn add_dependencies(
            &self,
            _directory: &Path,
            dependencies: &[String],
            development: bool,
            _output: &dyn Output,
        ) -> Result<(), WorkflowError> {
            self.calls
                .lock()
                .unwrap()
                .push((dependencies.to_vec(), development));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_add_dependency_delegates() {
        let recording = Arc::new(Recording::default());
        let manager: Arc<dyn PackageManager> = recording.clone();
        let mut fixture = Fixture::with_services(|services| services.with_package_manager(manager));

        fixture
            .run(json!([
                {"name": "add-dependency", "dependencies": ["zod"]},
                {"name": "add-dependency", "dependencies": ["vitest"], "development": true}
            ]))
            .await
            .unwrap();

        assert_eq!(
            *recording.calls.lock().unwrap(),
            vec![
                (vec!["zod".to_string()], false),
                (vec!["vitest".to_string()], true)
            ]
        );
    }

    #[tokio::test]
    async fn test_add_dependency_without_manager() {
        let mut fixture = Fixture::new();
        let error = fixture
            .run(json!([{"name": "add-dependency", "dependencies": ["zod"]}]))
            .await
            .unwrap_err();
        assert_eq!(error.reason(), Some(ErrorReason::PreconditionFailed));
    }

    #[tokio::test]
    async fn test_open_link_requires_http_url() {
        let mut fixture = Fixture::new();
        let error = fixture
            .run(json!([{"name": "open-link", "url": "file:///etc/passwd"}]))
            .await
            .unwrap_err();
        assert!(matches!(error, WorkflowError::InvalidOptions { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_stores_exit_code_or_fails() {
        let mut fixture = Fixture::new();
        fixture
            .run(json!([
                {"name": "run", "command": "sh", "arguments": ["-c", "exit 4"], "result": "code"},
                {"name": "run", "command": "sh", "arguments": ["-c", "touch created"]}
            ]))
            .await
            .unwrap();
        assert_eq!(fixture.context.value("code").await.unwrap(), json!(4));
        assert!(fixture.dir.path().join("created").is_file());

        let error = fixture
            .run(json!([{"name": "run", "command": "sh", "arguments": ["-c", "echo broken >&2; exit 2"]}]))
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Command `sh` exited with code 2");
        assert_eq!(error.help().details, vec!["broken"]);
    }
}
