//! Per-run execution context and its I/O collaborators

use crate::deferred::{resolve_with_limit, LazyValue, Variable, DEFAULT_MAX_DEPTH};
use crate::error::{ErrorReason, Help, WorkflowError};
use crate::expression::interpolate;
use async_trait::async_trait;
use colored::Colorize;
use indexmap::IndexMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use url::Url;

/// How a message should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semantics {
    Info,
    Warning,
    Error,
    Success,
}

/// Destination for user-facing messages
pub trait Output: Send + Sync {
    fn inform(&self, message: &str);
    fn warn(&self, message: &str);
    fn alert(&self, message: &str);
    fn confirm_success(&self, message: &str);

    fn write(&self, semantics: Semantics, message: &str) {
        match semantics {
            Semantics::Info => self.inform(message),
            Semantics::Warning => self.warn(message),
            Semantics::Error => self.alert(message),
            Semantics::Success => self.confirm_success(message),
        }
    }
}

/// Source of answers to questions asked while running
#[async_trait]
pub trait Input: Send + Sync {
    async fn text(&self, message: &str, default: Option<&str>) -> Result<String, WorkflowError>;
    async fn confirm(&self, message: &str, default: Option<bool>) -> Result<bool, WorkflowError>;
}

/// Writes styled messages to the terminal
#[derive(Debug, Clone, Default)]
pub struct ConsoleOutput;

impl Output for ConsoleOutput {
    fn inform(&self, message: &str) {
        println!("  {} {}", "->".blue(), message);
    }

    fn warn(&self, message: &str) {
        eprintln!("{} {}", "Warning:".yellow(), message);
    }

    fn alert(&self, message: &str) {
        eprintln!("{} {}", "Error:".red(), message);
    }

    fn confirm_success(&self, message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }
}

/// Records messages instead of printing them
#[derive(Debug, Default)]
pub struct MemoryOutput {
    messages: Mutex<Vec<(Semantics, String)>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Semantics, String)> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Messages of one kind, in the order they were written
    pub fn texts(&self, semantics: Semantics) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(kind, _)| *kind == semantics)
            .map(|(_, text)| text)
            .collect()
    }

    fn push(&self, semantics: Semantics, message: &str) {
        let mut messages = self
            .messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        messages.push((semantics, message.to_string()));
    }
}

impl Output for MemoryOutput {
    fn inform(&self, message: &str) {
        self.push(Semantics::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(Semantics::Warning, message);
    }

    fn alert(&self, message: &str) {
        self.push(Semantics::Error, message);
    }

    fn confirm_success(&self, message: &str) {
        self.push(Semantics::Success, message);
    }
}

/// Mutable state shared by the actions of a single run.
///
/// Variables are never defaulted: reading one that was not set is reported
/// to the caller, who decides what that means.
pub struct ExecutionContext {
    variables: IndexMap<String, Variable>,
    input: Option<Arc<dyn Input>>,
    output: Arc<dyn Output>,
    base_url: Url,
    working_dir: PathBuf,
    max_depth: usize,
}

impl ExecutionContext {
    pub fn new(output: Arc<dyn Output>, base_url: Url, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            variables: IndexMap::new(),
            input: None,
            output,
            base_url,
            working_dir: working_dir.into(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Context rooted at a directory, resolving relative URLs against it
    pub fn for_directory(
        output: Arc<dyn Output>,
        working_dir: impl Into<PathBuf>,
    ) -> Result<Self, WorkflowError> {
        let working_dir = working_dir.into();
        let base_url = Url::from_directory_path(&working_dir).map_err(|_| {
            WorkflowError::new(format!(
                "Working directory must be absolute: {}",
                working_dir.display()
            ))
        })?;
        Ok(Self::new(output, base_url, working_dir))
    }

    pub fn with_input(mut self, input: Arc<dyn Input>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Fresh variables for an imported template, sharing the I/O handles
    pub fn child(&self, base_url: Url) -> Self {
        Self {
            variables: IndexMap::new(),
            input: self.input.clone(),
            output: self.output.clone(),
            base_url,
            working_dir: self.working_dir.clone(),
            max_depth: self.max_depth,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Force a variable, failing if it was never set
    pub async fn value(&self, name: &str) -> Result<Value, WorkflowError> {
        match self.variables.get(name) {
            Some(variable) => variable.force().await,
            None => Err(WorkflowError::UndefinedVariable(name.to_string())),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), Variable::Literal(value));
    }

    pub fn set_lazy(&mut self, name: impl Into<String>, value: LazyValue) {
        self.variables.insert(name.into(), Variable::Lazy(value));
    }

    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        self.variables.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variables(&self) -> &IndexMap<String, Variable> {
        &self.variables
    }

    pub fn input(&self) -> Option<&Arc<dyn Input>> {
        self.input.as_ref()
    }

    pub fn output(&self) -> &Arc<dyn Output> {
        &self.output
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Interpolate variable references in `value` and resolve the result
    pub async fn evaluate(&self, value: &Value) -> Result<Value, WorkflowError> {
        let deferred = interpolate(value, &self.variables)?;
        resolve_with_limit(deferred, self.max_depth).await
    }

    /// Resolve a path option against the working directory
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    /// Resolve a URL option against the base URL
    ///
    /// A `github:` base keeps its query (the pinned `ref`) for references
    /// into the same repository owner that carry no query of their own.
    pub fn resolve_url(&self, reference: &str) -> Result<Url, WorkflowError> {
        let mut url = self.base_url.join(reference).map_err(|e| {
            WorkflowError::wrap(
                e,
                Help::with_reason(ErrorReason::InvalidInput).detail(format!("url: {}", reference)),
            )
        })?;

        let base = &self.base_url;
        if base.scheme() == "github"
            && url.scheme() == base.scheme()
            && url.host_str() == base.host_str()
            && url.query().is_none()
        {
            url.set_query(base.query());
        }
        Ok(url)
    }
}
