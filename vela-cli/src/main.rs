use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use similar::{ChangeTag, TextDiff};

use vela_core::differ::{create_plan, destroy_plan};
use vela_core::effect::Effect;
use vela_core::interpreter::{ApplyResult, Interpreter};
use vela_core::plan::{COMPONENT_ATTRIBUTE, Plan};
use vela_core::provider::Provider;
use vela_core::resolver::{self, BindingMap};
use vela_core::resource::{Resource, State, Value};
use vela_core::stack::{self, Stack, StackConfig};
use vela_state::{BackendConfig, StackReferences, StateBackend, StateFile, create_backend};

mod local;

use local::LocalProvider;

#[derive(Parser)]
#[command(name = "vela")]
#[command(about = "Builds VPC network topologies and the databases and applications placed in them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the stack file
    Validate {
        /// Path to the stack file
        #[arg(default_value = "stack.toml")]
        file: PathBuf,
    },
    /// Show execution plan without applying changes
    Plan {
        /// Path to the stack file
        #[arg(default_value = "stack.toml")]
        file: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        /// Path to the stack file
        #[arg(default_value = "stack.toml")]
        file: PathBuf,
    },
    /// Destroy every resource recorded for the stack
    Destroy {
        /// Path to the stack file
        #[arg(default_value = "stack.toml")]
        file: PathBuf,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Show the outputs published by the stack
    Output {
        /// Output key (e.g. educate-db.vpc_id); all outputs when omitted
        key: Option<String>,

        /// Path to the stack file
        #[arg(long, short, default_value = "stack.toml")]
        file: PathBuf,
    },
    /// Remove a stale state lock
    ForceUnlock {
        /// ID of the lock to remove
        lock_id: String,

        /// Path to the stack file
        #[arg(long, short, default_value = "stack.toml")]
        file: PathBuf,
    },
    /// Generate shell completions
    Completions {
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file } => run_validate(&file).await,
        Commands::Plan { file } => run_plan(&file).await,
        Commands::Apply { file } => run_apply(&file).await,
        Commands::Destroy { file, auto_approve } => run_destroy(&file, auto_approve).await,
        Commands::Output { key, file } => run_output(&file, key.as_deref()).await,
        Commands::ForceUnlock { lock_id, file } => run_force_unlock(&file, &lock_id).await,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "vela", &mut io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// A loaded stack file and the directory holding its state
struct Workspace {
    config: StackConfig,
    state_dir: PathBuf,
}

impl Workspace {
    fn load(file: &Path) -> Result<Self, String> {
        let config = StackConfig::load(file).map_err(|e| e.to_string())?;

        // Relative state paths are relative to the stack file
        let base = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let state_dir = base.join(&config.backend.path);

        Ok(Self { config, state_dir })
    }

    fn backend(&self) -> Result<Box<dyn StateBackend>, String> {
        create_backend(&BackendConfig::new(
            self.config.backend.backend_type.clone(),
            self.state_dir.clone(),
            self.config.name.clone(),
        ))
        .map_err(|e| e.to_string())
    }

    async fn build(&self) -> Result<Stack, String> {
        let references =
            StackReferences::load(&self.state_dir, &self.config.referenced_stacks()).await;
        stack::build(&self.config, &references).map_err(|e| e.to_string())
    }
}

async fn read_state(backend: &dyn StateBackend) -> Result<Option<StateFile>, String> {
    backend
        .read_state()
        .await
        .map_err(|e| format!("Failed to read state: {}", e))
}

async fn run_validate(file: &Path) -> Result<(), String> {
    let workspace = Workspace::load(file)?;
    let stack = workspace.build().await?;

    let mut components: Vec<&str> = stack
        .resources
        .iter()
        .filter_map(|r| r.attributes.get(COMPONENT_ATTRIBUTE).and_then(Value::as_str))
        .collect();
    components.sort();
    components.dedup();

    println!("{}", "Configuration is valid.".green().bold());
    println!(
        "  {} resources in {} components",
        stack.resources.len(),
        components.len()
    );
    Ok(())
}

async fn run_plan(file: &Path) -> Result<(), String> {
    let workspace = Workspace::load(file)?;
    let stack = workspace.build().await?;
    let backend = workspace.backend()?;

    let current = read_state(backend.as_ref())
        .await?
        .map(|state| state.states())
        .unwrap_or_default();

    let plan = plan_changes(&stack, &current);
    print_plan(&plan);
    Ok(())
}

/// Diff the declared resources against the recorded state
///
/// References are resolved first so that a resource whose dependencies
/// already exist compares equal to its recorded attributes.
fn plan_changes(stack: &Stack, current: &[State]) -> Plan {
    let desired = resolver::resolve_with_state(&stack.resources, current);
    create_plan(&desired, current)
}

async fn run_apply(file: &Path) -> Result<(), String> {
    let workspace = Workspace::load(file)?;
    let stack = workspace.build().await?;
    let backend = workspace.backend()?;

    let lock = backend
        .acquire_lock("apply")
        .await
        .map_err(|e| format!("Failed to acquire lock: {}", e))?;
    let result = apply_stack(&workspace, &stack, backend.as_ref()).await;
    release(backend.as_ref(), &lock, result).await
}

async fn apply_stack(
    workspace: &Workspace,
    stack: &Stack,
    backend: &dyn StateBackend,
) -> Result<(), String> {
    let state = read_state(backend)
        .await?
        .unwrap_or_else(|| StateFile::new(stack.name.as_str()));
    let current = state.states();

    let plan = plan_changes(stack, &current);
    if plan.is_empty() {
        println!("{}", "No changes needed.".green());
        return Ok(());
    }

    print_plan(&plan);
    println!();
    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let provider = LocalProvider::new(workspace.config.region.as_str(), &current);
    let provider_name = provider.name();
    let bindings = resolver::binding_map(&stack.resources, &current);
    let result = Interpreter::new(provider)
        .apply(&plan, &current, bindings)
        .await;
    print_outcomes(&plan, &result);

    let outputs = resolved_outputs(stack, &result.states);
    save_state(backend, state, provider_name, &result.states, &outputs).await?;

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", result.success_count())
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Apply stopped after {} changes; {} not attempted",
            result.success_count(),
            plan.effects().len() - result.outcomes.len()
        ))
    }
}

/// Outputs whose references all point at created resources
fn resolved_outputs(stack: &Stack, states: &[State]) -> BTreeMap<String, Value> {
    let created: Vec<Resource> = stack
        .resources
        .iter()
        .filter(|r| states.iter().any(|s| s.id == r.id))
        .cloned()
        .collect();
    let bindings = resolver::binding_map(&created, states);

    stack
        .outputs
        .iter()
        .map(|(key, value)| (key.clone(), resolver::resolve_value(value, &bindings)))
        .filter(|(key, value)| {
            let resolved = !value.has_unresolved_ref();
            if !resolved {
                log::warn!("output {} is not available yet", key);
            }
            resolved
        })
        .collect()
}

async fn save_state(
    backend: &dyn StateBackend,
    mut state: StateFile,
    provider: &str,
    states: &[State],
    outputs: &BTreeMap<String, Value>,
) -> Result<(), String> {
    state.replace_resources(provider, states);
    state.set_outputs(outputs);
    state.increment_serial();
    backend
        .write_state(&state)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))
}

/// Release `lock`, keeping the operation's own error if both fail
async fn release(
    backend: &dyn StateBackend,
    lock: &vela_state::LockInfo,
    result: Result<(), String>,
) -> Result<(), String> {
    match backend.release_lock(lock).await {
        Ok(()) => result,
        Err(e) if result.is_err() => {
            log::warn!("failed to release lock {}: {}", lock.id, e);
            result
        }
        Err(e) => Err(format!("Failed to release lock {}: {}", lock.id, e)),
    }
}

async fn run_destroy(file: &Path, auto_approve: bool) -> Result<(), String> {
    let workspace = Workspace::load(file)?;
    let backend = workspace.backend()?;

    let state = match read_state(backend.as_ref()).await? {
        Some(state) if !state.resources.is_empty() => state,
        _ => {
            println!("{}", "No resources to destroy.".green());
            return Ok(());
        }
    };

    let plan = destroy_plan(&state.states());
    println!("{}", "Destroy Plan:".red().bold());
    println!();
    for effect in plan.effects() {
        let id = effect.resource_id();
        println!("  {} {}.{}", "-".red().bold(), id.resource_type, id.name);
    }
    println!();
    println!("Plan: {} to destroy.", plan.effects().len().to_string().red());
    println!();

    // Confirmation prompt
    if !auto_approve {
        println!(
            "{}",
            "Do you really want to destroy all resources?".yellow().bold()
        );
        println!(
            "  {}",
            "This action cannot be undone. Type 'yes' to confirm.".yellow()
        );
        print!("\n  Enter a value: ");
        io::Write::flush(&mut io::stdout()).map_err(|e| e.to_string())?;

        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .map_err(|e| e.to_string())?;

        if input.trim() != "yes" {
            println!();
            println!("{}", "Destroy cancelled.".yellow());
            return Ok(());
        }
        println!();
    }

    let lock = backend
        .acquire_lock("destroy")
        .await
        .map_err(|e| format!("Failed to acquire lock: {}", e))?;
    let result = destroy_stack(&workspace, &plan, state, backend.as_ref()).await;
    release(backend.as_ref(), &lock, result).await
}

async fn destroy_stack(
    workspace: &Workspace,
    plan: &Plan,
    state: StateFile,
    backend: &dyn StateBackend,
) -> Result<(), String> {
    println!("{}", "Destroying resources...".red().bold());
    println!();

    let current = state.states();
    let provider = LocalProvider::new(workspace.config.region.as_str(), &current);
    let provider_name = provider.name();
    let result = Interpreter::new(provider)
        .apply(plan, &current, BindingMap::new())
        .await;
    print_outcomes(plan, &result);

    // Outputs may point at deleted resources
    save_state(backend, state, provider_name, &result.states, &BTreeMap::new()).await?;

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Destroy complete! {} resources destroyed.", result.success_count())
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Destroy stopped after {} changes; {} not attempted",
            result.success_count(),
            plan.effects().len() - result.outcomes.len()
        ))
    }
}

async fn run_output(file: &Path, key: Option<&str>) -> Result<(), String> {
    let workspace = Workspace::load(file)?;
    let backend = workspace.backend()?;
    let state = read_state(backend.as_ref()).await?.ok_or_else(|| {
        format!(
            "Stack '{}' has no state; run apply first",
            workspace.config.name
        )
    })?;

    match key {
        Some(key) => {
            let value = state
                .output(key)
                .ok_or_else(|| format!("Stack '{}' has no output '{}'", state.stack, key))?;
            println!("{}", format_value(&value));
        }
        None if state.outputs.is_empty() => {
            println!("{}", "No outputs.".yellow());
        }
        None => {
            for key in state.outputs.keys() {
                if let Some(value) = state.output(key) {
                    println!("{} = {}", key.bold(), format_value(&value).green());
                }
            }
        }
    }
    Ok(())
}

async fn run_force_unlock(file: &Path, lock_id: &str) -> Result<(), String> {
    let workspace = Workspace::load(file)?;
    let backend = workspace.backend()?;
    backend
        .force_unlock(lock_id)
        .await
        .map_err(|e| format!("Failed to unlock: {}", e))?;
    println!("{}", format!("Lock {} removed.", lock_id).green());
    Ok(())
}

fn print_outcomes(plan: &Plan, result: &ApplyResult) {
    for (effect, outcome) in plan.effects().iter().zip(&result.outcomes) {
        match outcome {
            Ok(_) => println!("  {} {}", "✓".green(), effect),
            Err(e) => println!("  {} {} - {}", "✗".red(), effect, e),
        }
    }
}

fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());

    for (component, indices) in plan.group_by_component() {
        println!();
        match component {
            Some(component) => println!("  {}", component.bold()),
            None => println!("  {}", "(no longer declared)".bold()),
        }
        for idx in indices {
            print_effect(&plan.effects()[idx]);
        }
    }

    println!();
    let summary = plan.summary();
    println!(
        "Plan: {} to add, {} to change, {} to destroy.",
        summary.create.to_string().green(),
        summary.update.to_string().yellow(),
        summary.delete.to_string().red()
    );
}

fn print_effect(effect: &Effect) {
    let attr_prefix = "        ";

    match effect {
        Effect::Create(r) => {
            println!(
                "    {} {} {}",
                "+".green().bold(),
                r.id.resource_type.cyan().bold(),
                r.id.name
            );
            for key in sorted_keys(&r.attributes) {
                println!(
                    "{}{}: {}",
                    attr_prefix,
                    key,
                    format_value(&r.attributes[key]).green()
                );
            }
        }
        Effect::Update { id, from, to } => {
            println!(
                "    {} {} {}",
                "~".yellow().bold(),
                id.resource_type.cyan().bold(),
                id.name
            );
            // Only attributes the declaration sets are compared
            let before = attribute_lines(&to.attributes, &from.attributes);
            let after = attribute_lines(&to.attributes, &to.attributes);
            let diff = TextDiff::from_lines(before.as_str(), after.as_str());
            for change in diff.iter_all_changes() {
                match change.tag() {
                    ChangeTag::Delete => print!("{}{} {}", attr_prefix, "-".red(), change),
                    ChangeTag::Insert => print!("{}{} {}", attr_prefix, "+".green(), change),
                    ChangeTag::Equal => {}
                }
            }
        }
        Effect::Delete { id, identifier } => {
            println!(
                "    {} {} {} ({})",
                "-".red().bold(),
                id.resource_type.cyan().bold(),
                id.name,
                identifier.red()
            );
        }
    }
}

/// Non-internal keys, `name` first
fn sorted_keys(attributes: &HashMap<String, Value>) -> Vec<&String> {
    let mut keys: Vec<_> = attributes.keys().filter(|k| !k.starts_with('_')).collect();
    keys.sort_by(|a, b| match (a.as_str(), b.as_str()) {
        ("name", _) => std::cmp::Ordering::Less,
        (_, "name") => std::cmp::Ordering::Greater,
        _ => a.cmp(b),
    });
    keys
}

/// One `key = value` line per key of `keys`, with values from `values`
fn attribute_lines(keys: &HashMap<String, Value>, values: &HashMap<String, Value>) -> String {
    sorted_keys(keys)
        .into_iter()
        .map(|key| {
            let value = values
                .get(key)
                .map(format_value)
                .unwrap_or_else(|| "(none)".to_string());
            format!("{} = {}\n", key, value)
        })
        .collect()
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut strs: Vec<_> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            strs.sort();
            format!("{{{}}}", strs.join(", "))
        }
        Value::ResourceRef(binding, attr) => format!("(known after apply: {}.{})", binding, attr),
    }
}
