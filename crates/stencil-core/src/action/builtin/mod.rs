//! Built-in action catalogue
//!
//! | name | purpose |
//! |---|---|
//! | `define`, `print`, `fail`, `prompt` | variables and messages |
//! | `check-path`, `create-directory`, `read-file`, `write-file`, `delete` | local files |
//! | `download`, `import` | remote resources and nested templates |
//! | `run`, `add-dependency`, `open-link` | external programs |
//! | `test`, `try`, `repeat` | control flow |

pub mod filesystem;
pub mod remote;
pub mod system;
pub mod variables;

use super::{ActionRegistry, ActionRunner, RepeatAction, TestAction, TryAction};
use crate::error::{ErrorReason, Help, WorkflowError};
use crate::package::PackageManager;
use crate::stack::ResourceStack;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

pub use filesystem::{
    CheckPathAction, CreateDirectoryAction, DeleteAction, ReadFileAction, WriteFileAction,
};
pub use remote::{DownloadAction, ImportAction};
pub use system::{AddDependencyAction, OpenLinkAction, RunAction};
pub use variables::{DefineAction, FailAction, PrintAction, PromptAction};

/// Collaborators the built-in actions depend on
#[derive(Clone)]
pub struct ActionServices {
    pub resources: Arc<ResourceStack>,
    pub package_manager: Option<Arc<dyn PackageManager>>,
}

impl ActionServices {
    pub fn new(resources: Arc<ResourceStack>) -> Self {
        Self {
            resources,
            package_manager: None,
        }
    }

    pub fn with_package_manager(mut self, package_manager: Arc<dyn PackageManager>) -> Self {
        self.package_manager = Some(package_manager);
        self
    }
}

/// Registry holding every built-in action
pub fn builtin_registry(services: ActionServices) -> Result<ActionRegistry, WorkflowError> {
    let mut builder = ActionRegistry::builder();

    builder
        .register(DefineAction::spec(), || Box::new(DefineAction))?
        .register(PrintAction::spec(), || Box::new(PrintAction))?
        .register(FailAction::spec(), || Box::new(FailAction))?
        .register(PromptAction::spec(), || Box::new(PromptAction))?
        .register(CheckPathAction::spec(), || Box::new(CheckPathAction))?
        .register(CreateDirectoryAction::spec(), || Box::new(CreateDirectoryAction))?
        .register(ReadFileAction::spec(), || Box::new(ReadFileAction))?
        .register(WriteFileAction::spec(), || Box::new(WriteFileAction))?
        .register(DeleteAction::spec(), || Box::new(DeleteAction))?
        .register(RunAction::spec(), || Box::new(RunAction))?
        .register(OpenLinkAction::spec(), || Box::new(OpenLinkAction))?
        .register(TestAction::spec(), || Box::new(TestAction))?
        .register(TryAction::spec(), || Box::new(TryAction))?
        .register(RepeatAction::spec(), || Box::new(RepeatAction))?;

    let resources = services.resources.clone();
    builder.register(DownloadAction::spec(), move || {
        Box::new(DownloadAction::new(resources.clone()))
    })?;

    let resources = services.resources.clone();
    builder.register(ImportAction::spec(), move || {
        Box::new(ImportAction::new(resources.clone()))
    })?;

    let package_manager = services.package_manager.clone();
    builder.register(AddDependencyAction::spec(), move || {
        Box::new(AddDependencyAction::new(package_manager.clone()))
    })?;

    builder.build()
}

impl ActionRunner {
    /// Runner over the built-in catalogue
    pub fn with_defaults(services: ActionServices) -> Result<Self, WorkflowError> {
        Ok(Self::new(Arc::new(builtin_registry(services)?)))
    }
}

/// Map an I/O error on `path` to a workflow error with a matching reason
pub(crate) fn io_failure(message: String, path: &Path, error: std::io::Error) -> WorkflowError {
    let reason = match error.kind() {
        ErrorKind::NotFound => ErrorReason::NotFound,
        ErrorKind::PermissionDenied => ErrorReason::AccessDenied,
        ErrorKind::AlreadyExists => ErrorReason::PreconditionFailed,
        _ => ErrorReason::Other,
    };
    WorkflowError::wrap(
        error,
        Help {
            message: Some(message),
            ..Help::with_reason(reason)
        }
        .detail(format!("path: {}", path.display())),
    )
}

/// Schema of an object with exactly the listed properties
pub(crate) fn options_schema(properties: serde_json::Value, required: &[&str]) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::context::{ExecutionContext, MemoryOutput};
    use tempfile::TempDir;

    /// A context rooted in a temporary directory plus a default runner
    pub struct Fixture {
        pub dir: TempDir,
        pub output: Arc<MemoryOutput>,
        pub context: ExecutionContext,
        pub runner: ActionRunner,
    }

    impl Fixture {
        pub fn new() -> Self {
            Self::with_services(|services| services)
        }

        pub fn with_services(configure: impl FnOnce(ActionServices) -> ActionServices) -> Self {
            let dir = TempDir::new().unwrap();
            let output = Arc::new(MemoryOutput::new());
            let context = ExecutionContext::for_directory(output.clone(), dir.path()).unwrap();
            let resources =
                Arc::new(ResourceStack::from_config(&RuntimeConfig::default()).unwrap());
            let runner =
                ActionRunner::with_defaults(configure(ActionServices::new(resources))).unwrap();
            Self {
                dir,
                output,
                context,
                runner,
            }
        }

        pub async fn run(
            &mut self,
            actions: serde_json::Value,
        ) -> Result<(), WorkflowError> {
            let actions: Vec<crate::action::ActionDefinition> =
                serde_json::from_value(actions).unwrap();
            self.runner.run(&actions, &mut self.context).await
        }
    }
}
