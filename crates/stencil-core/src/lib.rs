//! Stencil Core - resolution and execution runtime for scaffolding templates
//!
//! A template is a declarative document: a set of typed options and an
//! ordered list of actions. This library resolves templates from URLs and
//! runs their actions against a per-run variable context.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! - **Layer 1: Providers** - [`provider`] composes value resolution
//!   (caching, fallback, memoization, conditional selection) and
//!   [`resource`] specializes it to URL-addressed resources
//! - **Layer 2: Transports** - [`transport`] fetches raw content from
//!   `file:`, `http(s):` and GitHub URLs; [`stack`] assembles the full
//!   resource stack from a [`RuntimeConfig`]
//! - **Layer 3: Interpreter** - [`action`] holds the registry, the sequential
//!   [`ActionRunner`] and the built-in actions, operating on an
//!   [`ExecutionContext`] whose values may be [`deferred`]
//!
//! # Example Usage
//!
//! ```ignore
//! use stencil_core::{ActionRunner, ActionServices, ExecutionContext, ResourceStack, RuntimeConfig};
//!
//! let config = RuntimeConfig::load(None)?;
//! let resources = Arc::new(ResourceStack::from_config(&config)?);
//! let runner = ActionRunner::with_defaults(ActionServices::new(resources.clone()))?;
//!
//! let template = resources.template(&url).await?;
//! let mut context = ExecutionContext::new(output, directory_url(&template.url), dir);
//! template.value.resolve_options(&provided, &mut context).await?;
//! runner.run(&template.value.actions, &mut context).await?;
//! ```

pub mod action;
pub mod config;
pub mod context;
pub mod deferred;
pub mod error;
pub mod expression;
pub mod package;
pub mod process;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod stack;
pub mod template;
pub mod transport;
#[cfg(feature = "tui")]
pub mod tui;

// Re-export main types for convenience
pub use action::builtin::{builtin_registry, ActionServices};
pub use action::{Action, ActionDefinition, ActionRegistry, ActionRunner, ActionSpec};
pub use config::RuntimeConfig;
pub use context::{ConsoleOutput, ExecutionContext, Input, MemoryOutput, Output, Semantics};
pub use deferred::{resolve, Deferred, LazyValue, Variable};
pub use error::{ErrorPayload, ErrorReason, Help, ProviderError, ValidationError, WorkflowError};
pub use package::{CommandPackageManager, PackageManager};
pub use resource::{Resource, ResourceProvider};
pub use stack::{directory_url, ResourceStack};
pub use template::{OptionDefinition, OptionKind, Template};
pub use transport::Content;
#[cfg(feature = "tui")]
pub use tui::PromptInput;

/// Runtime version, compared against the version templates declare
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
