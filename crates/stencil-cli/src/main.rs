//! stencil - run declarative scaffolding templates

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use stencil_core::{
    directory_url, ActionRunner, ActionServices, CommandPackageManager, ConsoleOutput,
    ErrorPayload, ExecutionContext, OptionKind, Output, PromptInput, ResourceStack,
    RuntimeConfig, WorkflowError,
};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "stencil")]
#[command(about = "Run declarative scaffolding templates")]
#[command(version)]
pub struct Args {
    /// Runtime configuration file (YAML or JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a template
    Run(RunArgs),
    /// Show a template's options and actions
    Inspect(InspectArgs),
    /// List the available actions
    Actions,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Template URL or local path
    pub template: String,

    /// Option value, repeatable (e.g. --set name=my-app)
    #[arg(short, long = "set", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,

    /// Directory to run in (defaults to the current directory)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Never ask questions; prompts fall back to their defaults
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Template URL or local path
    pub template: String,
}

/// Parse `key=value`
fn parse_assignment(text: &str) -> Result<(String, String), String> {
    match text.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", text)),
    }
}

/// Interpret the template argument as a URL, or else as a local path
fn template_url(reference: &str, cwd: &Path) -> Result<Url> {
    if let Ok(url) = Url::parse(reference) {
        // single-letter schemes are Windows drive letters
        if url.scheme().len() > 1 {
            return Ok(url);
        }
    }

    let path = cwd.join(reference);
    let url = if path.is_dir() {
        Url::from_directory_path(&path)
    } else {
        Url::from_file_path(&path)
    };
    url.map_err(|_| anyhow::anyhow!("Invalid template path: {}", path.display()))
}

fn services(config: &RuntimeConfig) -> Result<(Arc<ResourceStack>, ActionRunner)> {
    let resources = Arc::new(ResourceStack::from_config(config)?);
    let runner = ActionRunner::with_defaults(
        ActionServices::new(resources.clone())
            .with_package_manager(CommandPackageManager::shared()),
    )?;
    Ok((resources, runner))
}

async fn run(config: &RuntimeConfig, args: RunArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let dir = match args.dir {
        Some(dir) => cwd.join(dir),
        None => cwd.clone(),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let (resources, runner) = services(config)?;
    let url = template_url(&args.template, &cwd)?;
    let template = resources.template(&url).await.map_err(WorkflowError::from)?;

    let output: Arc<dyn Output> = Arc::new(ConsoleOutput);
    if let Some(warning) = template.value.check_version(stencil_core::VERSION) {
        output.warn(&warning);
    }
    if let Some(title) = &template.value.title {
        println!();
        println!("{} {}", "Creating".bold(), title.cyan().bold());
        println!();
    }

    let mut context = ExecutionContext::new(output.clone(), directory_url(&template.url), &dir)
        .with_max_depth(config.max_depth);
    if !args.yes && PromptInput::is_available() {
        context = context.with_input(Arc::new(PromptInput::new()));
    }

    let provided: Map<String, Value> = args
        .set
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    template
        .value
        .resolve_options(&provided, &mut context)
        .await?;
    runner.run(&template.value.actions, &mut context).await?;

    println!();
    output.confirm_success(&format!("Done in {}", dir.display()));
    Ok(())
}

async fn inspect(config: &RuntimeConfig, args: InspectArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let (resources, _) = services(config)?;
    let url = template_url(&args.template, &cwd)?;
    let template = resources.template(&url).await.map_err(WorkflowError::from)?;
    let template = template.value;

    println!(
        "{}",
        template.title.as_deref().unwrap_or(url.as_str()).bold()
    );
    if let Some(description) = &template.description {
        println!("{}", description.dimmed());
    }
    if let Some(version) = &template.version {
        println!("{} {}", "Version:".dimmed(), version);
    }

    println!();
    println!("{}", "Options:".bold());
    if template.options.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for (name, option) in &template.options {
        let mut line = format!("  {} {}", name.cyan(), format!("<{}>", option.kind.type_name()).dimmed());
        if option.required {
            line.push_str(&format!(" {}", "required".yellow()));
        }
        if let Some(default) = &option.default {
            line.push_str(&format!(" {}", format!("[default: {}]", default).dimmed()));
        }
        println!("{}", line);
        if !option.description.is_empty() {
            println!("      {}", option.description);
        }
        if let OptionKind::String {
            choices: Some(choices),
        } = &option.kind
        {
            println!("      {} {}", "choices:".dimmed(), choices.join(", "));
        }
    }

    println!();
    println!("{}", "Actions:".bold());
    for (index, action) in template.actions.iter().enumerate() {
        println!("  {}. {}", index + 1, action.name);
    }
    Ok(())
}

fn list_actions(config: &RuntimeConfig) -> Result<()> {
    let (_, runner) = services(config)?;
    let width = runner
        .registry()
        .names()
        .map(str::len)
        .max()
        .unwrap_or(0);
    for spec in runner.registry().specs() {
        println!(
            "  {:width$}  {}",
            spec.name.cyan(),
            spec.description.dimmed(),
            width = width
        );
    }
    Ok(())
}

fn render_payload(payload: &ErrorPayload, depth: usize) {
    let indent = "  ".repeat(depth);
    if depth == 0 {
        eprintln!("{} {}", "Error:".red().bold(), payload.message);
    } else {
        eprintln!("{}{} {}", indent, "Caused by:".dimmed(), payload.message);
    }
    for detail in &payload.details {
        eprintln!("{}  {}", indent, detail.dimmed());
    }
    for suggestion in &payload.suggestions {
        eprintln!("{}  {} {}", indent, "->".blue(), suggestion);
    }
    for link in &payload.links {
        eprintln!("{}  {} {}", indent, link.description, link.url.underline());
    }
    if let Some(cause) = &payload.cause {
        render_payload(cause, depth + 1);
    }
}

fn render_error(error: &anyhow::Error) {
    eprintln!();
    match error.downcast_ref::<WorkflowError>() {
        Some(workflow) => render_payload(&workflow.payload(), 0),
        None => {
            eprintln!("{} {}", "Error:".red().bold(), error);
            for cause in error.chain().skip(1) {
                eprintln!("  {} {}", "Caused by:".dimmed(), cause);
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Ensure terminal cursor is restored on panic
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = console::Term::stderr().show_cursor();
        default_panic(info);
    }));

    // Handle Ctrl+C gracefully
    ctrlc::set_handler(move || {
        let _ = console::Term::stderr().show_cursor();
        std::process::exit(130);
    })
    .ok();

    let args = Args::parse();

    let result: Result<()> = async {
        let config = RuntimeConfig::load(args.config.as_deref())?;
        match args.command {
            Command::Run(run_args) => run(&config, run_args).await,
            Command::Inspect(inspect_args) => inspect(&config, inspect_args).await,
            Command::Actions => list_actions(&config),
        }
    }
    .await;

    // Ensure cursor is visible on normal exit
    let _ = console::Term::stderr().show_cursor();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            render_error(&error);
            ExitCode::FAILURE
        }
    }
}
