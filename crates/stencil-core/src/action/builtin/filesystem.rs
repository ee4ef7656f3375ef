//! Local file actions
//!
//! Relative paths resolve against the context's working directory.

use super::{io_failure, options_schema};
use crate::action::{parse_options, Action, ActionRunner, ActionSpec, Options};
use crate::context::ExecutionContext;
use crate::error::{ErrorReason, Help, WorkflowError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::debug;

#[derive(Deserialize)]
struct CheckPathOptions {
    path: String,
    result: String,
}

/// `check-path`: store whether a path exists
pub struct CheckPathAction;

impl CheckPathAction {
    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "check-path",
            "Check whether a file or directory exists",
            options_schema(
                json!({
                    "path": {"type": "string"},
                    "result": {"type": "string", "minLength": 1}
                }),
                &["path", "result"],
            ),
        )
    }
}

#[async_trait]
impl Action for CheckPathAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        _runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let options: CheckPathOptions = parse_options("check-path", options)?;
        let path = context.resolve_path(&options.path);
        let exists = fs::try_exists(&path)
            .await
            .map_err(|e| io_failure(format!("Failed to check {}", path.display()), &path, e))?;
        context.set(options.result, Value::Bool(exists));
        Ok(())
    }
}

#[derive(Deserialize)]
struct PathOptions {
    path: String,
}

/// `create-directory`: create a directory and its parents
pub struct CreateDirectoryAction;

impl CreateDirectoryAction {
    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "create-directory",
            "Create a directory, including missing parents",
            options_schema(json!({"path": {"type": "string"}}), &["path"]),
        )
    }
}

#[async_trait]
impl Action for CreateDirectoryAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        _runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let PathOptions { path } = parse_options("create-directory", options)?;
        let path = context.resolve_path(&path);
        fs::create_dir_all(&path)
            .await
            .map_err(|e| io_failure(format!("Failed to create {}", path.display()), &path, e))
    }
}

#[derive(Deserialize)]
struct ReadFileOptions {
    path: String,
    result: String,
    #[serde(default)]
    optional: bool,
}

/// `read-file`: store a file's UTF-8 content
pub struct ReadFileAction;

impl ReadFileAction {
    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "read-file",
            "Read a text file into a variable",
            options_schema(
                json!({
                    "path": {"type": "string"},
                    "result": {"type": "string", "minLength": 1},
                    "optional": {"type": "boolean"}
                }),
                &["path", "result"],
            ),
        )
    }
}

#[async_trait]
impl Action for ReadFileAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        _runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let options: ReadFileOptions = parse_options("read-file", options)?;
        let path = context.resolve_path(&options.path);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => Value::String(content),
            Err(e) if e.kind() == ErrorKind::NotFound && options.optional => {
                debug!(path = %path.display(), "optional file is missing");
                Value::Null
            }
            Err(e) => {
                return Err(io_failure(
                    format!("Failed to read {}", path.display()),
                    &path,
                    e,
                ))
            }
        };

        context.set(options.result, content);
        Ok(())
    }
}

#[derive(Deserialize)]
struct WriteFileOptions {
    path: String,
    content: String,
    #[serde(default)]
    overwrite: bool,
}

/// `write-file`: write text, creating parent directories
pub struct WriteFileAction;

impl WriteFileAction {
    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "write-file",
            "Write a text file",
            options_schema(
                json!({
                    "path": {"type": "string"},
                    "content": {"type": "string"},
                    "overwrite": {"type": "boolean"}
                }),
                &["path", "content"],
            ),
        )
    }
}

#[async_trait]
impl Action for WriteFileAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        _runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let options: WriteFileOptions = parse_options("write-file", options)?;
        let path = context.resolve_path(&options.path);

        if !options.overwrite && path.exists() {
            return Err(already_exists(&path));
        }
        write_file(&path, options.content.as_bytes()).await
    }
}

/// Error for a destination that exists and may not be replaced
pub(crate) fn already_exists(path: &Path) -> WorkflowError {
    WorkflowError::with_help(
        format!("{} already exists", path.display()),
        Help::with_reason(ErrorReason::PreconditionFailed)
            .suggestion("Set `overwrite: true` to replace existing files"),
    )
}

/// Write `contents`, creating parent directories first
pub(crate) async fn write_file(path: &Path, contents: &[u8]) -> Result<(), WorkflowError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| {
            io_failure(format!("Failed to create {}", parent.display()), parent, e)
        })?;
    }
    fs::write(path, contents)
        .await
        .map_err(|e| io_failure(format!("Failed to write {}", path.display()), path, e))
}

#[derive(Deserialize)]
struct DeleteOptions {
    path: String,
    #[serde(default)]
    recursive: bool,
}

/// `delete`: remove a file or directory; a missing path is left alone
pub struct DeleteAction;

impl DeleteAction {
    pub fn spec() -> ActionSpec {
        ActionSpec::new(
            "delete",
            "Delete a file or directory",
            options_schema(
                json!({
                    "path": {"type": "string"},
                    "recursive": {"type": "boolean"}
                }),
                &["path"],
            ),
        )
    }
}

#[async_trait]
impl Action for DeleteAction {
    async fn execute(
        &self,
        options: Options,
        context: &mut ExecutionContext,
        _runner: &ActionRunner,
    ) -> Result<(), WorkflowError> {
        let options: DeleteOptions = parse_options("delete", options)?;
        let path = context.resolve_path(&options.path);

        let metadata = match fs::symlink_metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "nothing to delete");
                return Ok(());
            }
            Err(e) => {
                return Err(io_failure(
                    format!("Failed to access {}", path.display()),
                    &path,
                    e,
                ))
            }
        };

        let result = if !metadata.is_dir() {
            fs::remove_file(&path).await
        } else if options.recursive {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_dir(&path).await
        };
        result.map_err(|e| io_failure(format!("Failed to delete {}", path.display()), &path, e))
    }
}
