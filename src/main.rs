//! dsfleet CLI - fleet administration for database-security registrations
//!
//! Usage: dsfleet <COMMAND>
//!
//! Commands:
//!   move         Move targets (and their dependents) to another compartment
//!   refresh      Refresh target metadata from the underlying databases
//!   retag        Tag targets with an environment derived from their names
//!   audit-start  Start audit collection on idle audit trails
//!   snapshot     Capture the resolved selection to a snapshot file

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use dsfleet::actions::{self, MoveTargets, RefreshTargets, RetagTargets, StartAuditCollection};
use dsfleet::compartment::CompartmentResolver;
use dsfleet::config::Config;
use dsfleet::executor::{
    exit_code, Action, BatchExecutor, ErrorPolicy, EventSink, ExecOptions, TerminalConfirmer,
};
use dsfleet::models::{CompartmentId, ExecutionMode, LifecycleState};
use dsfleet::report::{self, HumanSink, JsonSink};
use dsfleet::selector::{SelectorOptions, TargetSelector};
use dsfleet::snapshot::{MaxAge, SelectionSnapshot, SnapshotEntry};
use dsfleet::{FleetError, HttpCatalog, TargetCatalog};

/// dsfleet - fleet administration for database-security registrations
#[derive(Parser, Debug)]
#[command(name = "dsfleet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit NDJSON events instead of human output
    #[arg(long, global = true)]
    json: bool,

    /// Path to a config file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct SelectionArgs {
    /// Comma-separated target names and/or identifiers
    #[arg(long)]
    targets: Option<String>,

    /// Compartment scope (name or identifier)
    #[arg(long)]
    compartment: Option<String>,

    /// Lifecycle state filter for compartment scans (repeatable, OR semantics)
    #[arg(long = "lifecycle-state", value_enum)]
    lifecycle_state: Vec<LifecycleState>,

    /// Regex filter on display names for compartment scans
    #[arg(long)]
    name_filter: Option<String>,

    /// Replay a previously captured selection instead of live discovery
    #[arg(long, value_name = "PATH")]
    from_snapshot: Option<PathBuf>,
}

impl SelectionArgs {
    fn to_spec(&self) -> dsfleet::SelectionSpec {
        dsfleet::SelectionSpec {
            targets: self.targets.clone(),
            compartment: self.compartment.clone(),
            lifecycle_states: self.lifecycle_state.clone(),
            name_filter: self.name_filter.clone(),
            from_snapshot: self.from_snapshot.clone(),
        }
    }
}

#[derive(Args, Debug, Default)]
struct ExecutionArgs {
    /// Preview the run without issuing any mutating call
    #[arg(long)]
    dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    yes: bool,

    /// Abort the batch at the first per-target failure
    #[arg(long, conflicts_with = "continue_on_error")]
    stop_on_error: bool,

    /// Keep going past per-target failures (the default)
    #[arg(long)]
    continue_on_error: bool,

    /// Maximum snapshot age for mutating replays (seconds, 30m/12h/7d, or 'disable')
    #[arg(long, default_value = "24h", value_name = "AGE")]
    max_snapshot_age: String,

    /// Use a stale snapshot anyway
    #[arg(long)]
    allow_stale_snapshot: bool,

    /// Write the per-target outcomes JSON array to this file
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

impl ExecutionArgs {
    fn mode(&self) -> ExecutionMode {
        if self.dry_run {
            ExecutionMode::DryRun
        } else {
            ExecutionMode::Apply
        }
    }

    fn error_policy(&self, action: &dyn Action) -> ErrorPolicy {
        if self.stop_on_error {
            ErrorPolicy::Stop
        } else if self.continue_on_error {
            ErrorPolicy::Continue
        } else {
            action.default_error_policy()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Move targets (and their dependents) to another compartment
    Move {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Destination compartment (name or identifier)
        #[arg(long)]
        destination: Option<String>,

        /// Move only the target objects, leaving dependents in place
        #[arg(long)]
        skip_dependents: bool,

        #[command(flatten)]
        execution: ExecutionArgs,
    },

    /// Refresh target metadata from the underlying databases
    Refresh {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        execution: ExecutionArgs,
    },

    /// Tag targets with an environment derived from their display names
    Retag {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        execution: ExecutionArgs,
    },

    /// Start audit collection on every idle audit trail
    AuditStart {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        execution: ExecutionArgs,
    },

    /// Capture the resolved selection to a snapshot file
    Snapshot {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Snapshot file to write
        #[arg(long, value_name = "PATH")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, warnings) = Config::load_or_default(cli.config.as_deref())?;
    if !cli.json {
        for warning in &warnings {
            println!(
                "⚠ unknown config key '{}' in {}",
                warning.key,
                warning.file.display()
            );
        }
    }

    let code = match &cli.command {
        Commands::Move {
            selection,
            destination,
            skip_dependents,
            execution,
        } => cmd_move(
            &config,
            selection,
            destination.as_deref(),
            *skip_dependents,
            execution,
            cli.json,
        )?,
        Commands::Refresh {
            selection,
            execution,
        } => cmd_refresh(&config, selection, execution, cli.json)?,
        Commands::Retag {
            selection,
            execution,
        } => cmd_retag(&config, selection, execution, cli.json)?,
        Commands::AuditStart {
            selection,
            execution,
        } => cmd_audit_start(&config, selection, execution, cli.json)?,
        Commands::Snapshot { selection, output } => {
            cmd_snapshot(&config, selection, output, cli.json)?
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Fail fast on everything checkable without a service call.
fn validate_up_front(
    selection: &SelectionArgs,
    execution: &ExecutionArgs,
) -> Result<MaxAge, FleetError> {
    selection.to_spec().criteria()?;
    execution.max_snapshot_age.parse::<MaxAge>()
}

fn catalog_from_config(config: &Config) -> Result<HttpCatalog> {
    let endpoint = config.api.endpoint.clone().ok_or_else(|| {
        anyhow::anyhow!(
            "no API endpoint configured - set api.endpoint in the config or DSFLEET_ENDPOINT"
        )
    })?;
    Ok(HttpCatalog::new(&endpoint, config.auth_token())?)
}

fn root_compartment(config: &Config) -> Option<CompartmentId> {
    config
        .fleet
        .root_compartment
        .as_deref()
        .map(CompartmentId::new)
}

fn cmd_move(
    config: &Config,
    selection: &SelectionArgs,
    destination: Option<&str>,
    skip_dependents: bool,
    execution: &ExecutionArgs,
    json: bool,
) -> Result<i32> {
    let max_age = validate_up_front(selection, execution)?;
    let destination = destination.ok_or(FleetError::MissingDestination)?;

    let catalog = catalog_from_config(config)?;
    let resolver = CompartmentResolver::new(&catalog, root_compartment(config));
    let source = resolver.scope_or_default(selection.compartment.as_deref())?;
    let destination = resolver.resolve(destination)?;

    if !json {
        println!("🛡 dsfleet move");
        println!("Source:      {}", source.describe());
        println!("Destination: {}", destination.describe());
        if execution.dry_run {
            println!("Mode: Dry run");
        }
        println!();
    }

    let action = MoveTargets::new(&catalog, source, destination, !skip_dependents)?;
    run_batch(&catalog, &resolver, &action, selection, execution, max_age, json)
}

fn cmd_refresh(
    config: &Config,
    selection: &SelectionArgs,
    execution: &ExecutionArgs,
    json: bool,
) -> Result<i32> {
    let max_age = validate_up_front(selection, execution)?;
    let catalog = catalog_from_config(config)?;
    let resolver = CompartmentResolver::new(&catalog, root_compartment(config));

    if !json {
        println!("🛡 dsfleet refresh");
        if execution.dry_run {
            println!("Mode: Dry run");
        }
        println!();
    }

    let action = RefreshTargets::new(&catalog);
    run_batch(&catalog, &resolver, &action, selection, execution, max_age, json)
}

fn cmd_retag(
    config: &Config,
    selection: &SelectionArgs,
    execution: &ExecutionArgs,
    json: bool,
) -> Result<i32> {
    let max_age = validate_up_front(selection, execution)?;
    let rules = if config.tags.rules.is_empty() {
        actions::default_rules()
    } else {
        actions::retag::compile_rules(&config.tags.rules)?
    };

    let catalog = catalog_from_config(config)?;
    let resolver = CompartmentResolver::new(&catalog, root_compartment(config));

    if !json {
        println!("🛡 dsfleet retag");
        println!("Tag key: {}", config.tags.environment_key);
        if execution.dry_run {
            println!("Mode: Dry run");
        }
        println!();
    }

    let action = RetagTargets::new(&catalog, config.tags.environment_key.clone(), rules);
    run_batch(&catalog, &resolver, &action, selection, execution, max_age, json)
}

fn cmd_audit_start(
    config: &Config,
    selection: &SelectionArgs,
    execution: &ExecutionArgs,
    json: bool,
) -> Result<i32> {
    let max_age = validate_up_front(selection, execution)?;
    let catalog = catalog_from_config(config)?;
    let resolver = CompartmentResolver::new(&catalog, root_compartment(config));

    if !json {
        println!("🛡 dsfleet audit-start");
        if execution.dry_run {
            println!("Mode: Dry run");
        }
        println!();
    }

    let action = StartAuditCollection::new(&catalog);
    run_batch(&catalog, &resolver, &action, selection, execution, max_age, json)
}

fn cmd_snapshot(
    config: &Config,
    selection: &SelectionArgs,
    output: &PathBuf,
    json: bool,
) -> Result<i32> {
    selection.to_spec().criteria()?;
    let catalog = catalog_from_config(config)?;
    let resolver = CompartmentResolver::new(&catalog, root_compartment(config));
    let selector = TargetSelector::new(&catalog, &resolver);

    // Capture is read-only; an old snapshot may be re-captured freely.
    let opts = SelectorOptions {
        policy: dsfleet::ResolutionPolicy::BestEffort,
        mode: ExecutionMode::DryRun,
        max_snapshot_age: MaxAge::Disabled,
        allow_stale_snapshot: true,
    };
    let resolved = selector.resolve(&selection.to_spec(), &opts)?;
    report_failures(&resolved, json);

    let mut entries = Vec::with_capacity(resolved.targets.len());
    for target in &resolved.targets {
        let full = catalog.get_target(&target.id)?;
        entries.push(SnapshotEntry {
            id: full.id,
            display_name: full.display_name,
            lifecycle_state: full.lifecycle_state,
            compartment_id: full.compartment_id,
        });
    }
    let snapshot = SelectionSnapshot::new(entries);
    snapshot.save(output)?;

    if json {
        let mut out = std::io::stdout().lock();
        let _ = report::write_event(
            &mut out,
            &serde_json::json!({
                "event": "snapshot",
                "path": output.display().to_string(),
                "targets": snapshot.targets.len(),
            }),
        );
    } else {
        println!(
            "✓ Captured {} targets to {}",
            snapshot.targets.len(),
            output.display()
        );
    }
    Ok(0)
}

fn report_failures(selection: &dsfleet::Selection, json: bool) {
    for failure in &selection.failures {
        if json {
            let mut out = std::io::stdout().lock();
            let _ = report::write_event(
                &mut out,
                &serde_json::json!({
                    "event": "resolution_failure",
                    "entry": failure.entry,
                    "reason": failure.reason,
                }),
            );
        } else {
            println!("⚠ {}: {}", failure.entry, failure.reason);
        }
    }
}

/// Shared resolve-then-execute flow for every fleet operation.
fn run_batch<C: TargetCatalog>(
    catalog: &C,
    resolver: &CompartmentResolver<C>,
    action: &dyn Action,
    selection_args: &SelectionArgs,
    execution: &ExecutionArgs,
    max_age: MaxAge,
    json: bool,
) -> Result<i32> {
    let mode = execution.mode();
    let selector = TargetSelector::new(catalog, resolver);
    let opts = SelectorOptions {
        policy: action.resolution_policy(),
        mode,
        max_snapshot_age: max_age,
        allow_stale_snapshot: execution.allow_stale_snapshot,
    };
    let selection = selector.resolve(&selection_args.to_spec(), &opts)?;
    report_failures(&selection, json);

    if selection.is_empty() {
        let message = selection
            .warning
            .clone()
            .unwrap_or_else(|| "no targets matched the selection - nothing to do".to_string());
        if json {
            let mut out = std::io::stdout().lock();
            let _ = report::write_event(
                &mut out,
                &serde_json::json!({ "event": "empty_selection", "message": message }),
            );
        } else {
            println!("⚠ {message}");
        }
        // All-entries-unresolvable is an operator error even best-effort.
        return Ok(if selection.failures.is_empty() { 0 } else { 1 });
    }

    if !json {
        println!(
            "Resolved {} target(s) from {}",
            selection.len(),
            selection.describe_source()
        );
    }

    let sink: Box<dyn EventSink> = if json {
        Box::new(JsonSink)
    } else {
        Box::new(HumanSink {
            color: report::supports_color(),
            multi_phase: action.phases().len() > 1,
        })
    };
    let executor = BatchExecutor::new(&TerminalConfirmer, sink.as_ref());
    let report = executor.run(
        &selection,
        action,
        &ExecOptions {
            mode,
            error_policy: execution.error_policy(action),
            assume_yes: execution.yes,
        },
    );

    if !json {
        println!();
        print!("{}", report::render_summary(action.operation(), &report, mode));
    }

    if let Some(path) = &execution.output {
        report::write_outcomes(path, &report.results)?;
    }

    Ok(exit_code(&report))
}
