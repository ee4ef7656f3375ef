//! Package manager collaborator

use crate::context::Output;
use crate::error::{ErrorReason, Help, WorkflowError};
use crate::process::run_command;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Installs dependencies into a project
#[async_trait]
pub trait PackageManager: Send + Sync {
    fn name(&self) -> &'static str;

    async fn add_dependencies(
        &self,
        directory: &Path,
        dependencies: &[String],
        development: bool,
        output: &dyn Output,
    ) -> Result<(), WorkflowError>;
}

/// JavaScript package managers, told apart by their lock files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManagerKind {
    Npm,
    Yarn,
    Pnpm,
    Bun,
}

impl PackageManagerKind {
    const LOCK_FILES: [(&'static str, PackageManagerKind); 5] = [
        ("bun.lockb", PackageManagerKind::Bun),
        ("bun.lock", PackageManagerKind::Bun),
        ("pnpm-lock.yaml", PackageManagerKind::Pnpm),
        ("yarn.lock", PackageManagerKind::Yarn),
        ("package-lock.json", PackageManagerKind::Npm),
    ];

    /// Detect from the lock file in `directory`, defaulting to npm
    pub fn detect(directory: &Path) -> Self {
        Self::LOCK_FILES
            .iter()
            .find(|(file, _)| directory.join(file).is_file())
            .map(|(_, kind)| *kind)
            .unwrap_or(PackageManagerKind::Npm)
    }

    pub fn program(&self) -> &'static str {
        match self {
            PackageManagerKind::Npm => "npm",
            PackageManagerKind::Yarn => "yarn",
            PackageManagerKind::Pnpm => "pnpm",
            PackageManagerKind::Bun => "bun",
        }
    }

    /// Arguments that add `dependencies`
    pub fn add_arguments(&self, dependencies: &[String], development: bool) -> Vec<String> {
        let (command, dev_flag) = match self {
            PackageManagerKind::Npm => ("install", "--save-dev"),
            PackageManagerKind::Yarn => ("add", "--dev"),
            PackageManagerKind::Pnpm => ("add", "--save-dev"),
            PackageManagerKind::Bun => ("add", "--dev"),
        };

        let mut arguments = vec![command.to_string()];
        if development {
            arguments.push(dev_flag.to_string());
        }
        arguments.extend(dependencies.iter().cloned());
        arguments
    }
}

/// Shells out to the package manager detected in the target directory
#[derive(Debug, Clone, Default)]
pub struct CommandPackageManager {
    fixed: Option<PackageManagerKind>,
}

impl CommandPackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always use `kind` instead of detecting
    pub fn with_kind(kind: PackageManagerKind) -> Self {
        Self { fixed: Some(kind) }
    }

    pub fn shared() -> Arc<dyn PackageManager> {
        Arc::new(Self::new())
    }

    pub fn kind(&self, directory: &Path) -> PackageManagerKind {
        self.fixed
            .unwrap_or_else(|| PackageManagerKind::detect(directory))
    }
}

#[async_trait]
impl PackageManager for CommandPackageManager {
    fn name(&self) -> &'static str {
        self.fixed.map(|kind| kind.program()).unwrap_or("auto")
    }

    async fn add_dependencies(
        &self,
        directory: &Path,
        dependencies: &[String],
        development: bool,
        output: &dyn Output,
    ) -> Result<(), WorkflowError> {
        if dependencies.is_empty() {
            return Ok(());
        }

        let kind = self.kind(directory);
        let arguments = kind.add_arguments(dependencies, development);
        output.inform(&format!(
            "Installing {} with {}",
            dependencies.join(", "),
            kind.program()
        ));

        let result = run_command(kind.program(), &arguments, directory, output).await?;
        if result.success() {
            return Ok(());
        }

        let mut help = Help::with_reason(ErrorReason::Other)
            .suggestion(format!(
                "Run `{} {}` manually to see the full output",
                kind.program(),
                arguments.join(" ")
            ));
        for line in result.stderr.iter().rev().take(5).rev() {
            help = help.detail(line.clone());
        }
        Err(WorkflowError::with_help(
            format!(
                "{} exited with code {} while installing dependencies",
                kind.program(),
                result.code
            ),
            help,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn deps(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_detects_from_lock_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(PackageManagerKind::detect(dir.path()), PackageManagerKind::Npm);

        std::fs::write(dir.path().join("yarn.lock"), "").unwrap();
        assert_eq!(PackageManagerKind::detect(dir.path()), PackageManagerKind::Yarn);

        std::fs::write(dir.path().join("pnpm-lock.yaml"), "").unwrap();
        assert_eq!(PackageManagerKind::detect(dir.path()), PackageManagerKind::Pnpm);
    }

    #[test]
    fn test_add_arguments() {
        assert_eq!(
            PackageManagerKind::Npm.add_arguments(&deps(&["zod"]), true),
            deps(&["install", "--save-dev", "zod"])
        );
        assert_eq!(
            PackageManagerKind::Yarn.add_arguments(&deps(&["a", "b"]), false),
            deps(&["add", "a", "b"])
        );
        assert_eq!(
            PackageManagerKind::Bun.add_arguments(&deps(&["a"]), true),
            deps(&["add", "--dev", "a"])
        );
    }

    #[test]
    fn test_fixed_kind_wins_over_detection() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("yarn.lock"), "").unwrap();

        let manager = CommandPackageManager::with_kind(PackageManagerKind::Pnpm);
        assert_eq!(manager.kind(dir.path()), PackageManagerKind::Pnpm);
        assert_eq!(manager.name(), "pnpm");
        assert_eq!(
            CommandPackageManager::new().kind(dir.path()),
            PackageManagerKind::Yarn
        );
    }
}
