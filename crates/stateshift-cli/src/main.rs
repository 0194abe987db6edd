//! `stateshift` command line
//!
//! Runs a declarative migration plan against a JSON snapshot, or prints what a
//! plan registers.

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;
use stateshift_migrate::{MigrationInfo, MigrationPlan, MigrationResult, Version};
use stateshift_store::PersistedEnvelope;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("stateshift")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Versioned persisted-state migrations")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("migrate")
                .about("Migrate a JSON snapshot with a plan")
                .arg(plan_arg())
                .arg(
                    Arg::new("input")
                        .long("input")
                        .short('i')
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Snapshot file: raw state, or {\"state\", \"version\"} envelope"),
                )
                .arg(
                    Arg::new("from")
                        .long("from")
                        .value_parser(value_parser!(u32))
                        .help("Version the snapshot was saved with (read from the envelope if omitted)"),
                )
                .arg(
                    Arg::new("to")
                        .long("to")
                        .value_parser(value_parser!(u32))
                        .help("Target version (defaults to the plan's target)"),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the migrated envelope here instead of stdout"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the full migration result as JSON"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Show the migrations a plan registers")
                .arg(plan_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

fn plan_arg() -> Arg {
    Arg::new("plan")
        .long("plan")
        .short('p')
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Plan file (.toml, .yaml, .yml or .json)")
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    let matches = cli().get_matches();
    let outcome = match matches.subcommand() {
        Some(("migrate", args)) => run_migrate(args),
        Some(("info", args)) => run_info(args),
        _ => unreachable!("subcommand is required"),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn run_migrate(args: &ArgMatches) -> Result<ExitCode> {
    let plan = load_plan(args)?;
    let input_path = required_path(args, "input")?;
    let raw = std::fs::read_to_string(input_path)
        .with_context(|| format!("reading snapshot {}", input_path.display()))?;
    let input: Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing snapshot {}", input_path.display()))?;

    let (state, from) = split_input(input, args.get_one::<u32>("from").copied())?;
    let to = args
        .get_one::<u32>("to")
        .copied()
        .unwrap_or_else(|| plan.target_version());

    if to < from {
        tracing::warn!(from, to, "Snapshot is newer than the target, leaving it as is");
    }

    let mut manager = plan.build_manager()?;
    let result = manager.migrate(&state, from, to);
    report(&result);

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    if !result.success {
        return Ok(ExitCode::FAILURE);
    }

    let envelope = output_envelope(result, from, to);
    let version = envelope.version;
    let encoded = serde_json::to_string_pretty(&envelope)?;
    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            std::fs::write(path, encoded)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), version, "Wrote migrated snapshot");
        }
        None if !args.get_flag("json") => println!("{encoded}"),
        None => {}
    }

    Ok(ExitCode::SUCCESS)
}

fn run_info(args: &ArgMatches) -> Result<ExitCode> {
    let plan = load_plan(args)?;
    let manager = plan.build_manager()?;
    let info = manager.migration_info();

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print!("{}", render_info(&plan.store, &info));
    }
    Ok(ExitCode::SUCCESS)
}

fn load_plan(args: &ArgMatches) -> Result<MigrationPlan> {
    let path = required_path(args, "plan")?;
    MigrationPlan::load(path).with_context(|| format!("loading plan {}", path.display()))
}

fn required_path<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a Path> {
    match args.get_one::<PathBuf>(name) {
        Some(path) => Ok(path.as_path()),
        None => bail!("--{name} is required"),
    }
}

/// Separate state from its version: an explicit `--from` wins, otherwise the
/// input must be an envelope
fn split_input(input: Value, from: Option<Version>) -> Result<(Value, Version)> {
    if let Some(from) = from {
        return Ok((input, from));
    }

    let is_envelope = input
        .as_object()
        .is_some_and(|map| map.contains_key("state") && map.contains_key("version"));
    if !is_envelope {
        bail!("snapshot is not a {{\"state\", \"version\"}} envelope; pass --from");
    }

    let envelope: PersistedEnvelope =
        serde_json::from_value(input).context("decoding snapshot envelope")?;
    Ok((envelope.state, envelope.version))
}

/// Envelope for a successful run
///
/// The runner never downgrades, so a snapshot at or above `to` keeps `from`.
fn output_envelope(result: MigrationResult<Value>, from: Version, to: Version) -> PersistedEnvelope {
    PersistedEnvelope::new(result.migrated_state, to.max(from))
}

fn report(result: &MigrationResult<Value>) {
    for warning in &result.warnings {
        tracing::warn!("{warning}");
    }
    for error in &result.errors {
        tracing::error!("{error}");
    }
    if result.success {
        tracing::info!(applied = ?result.applied_migrations, "Migration succeeded");
    } else {
        tracing::error!(halted_at = ?result.halted_at(), "Migration halted");
    }
}

fn render_info(store: &str, info: &MigrationInfo) -> String {
    let mut out = format!(
        "Store: {store}\nMigrations: {}\nLatest: {}\n",
        info.total,
        info.latest.map_or_else(|| "-".to_string(), |v| v.to_string())
    );
    for step in &info.steps {
        let flags = [
            (step.critical, "critical"),
            (step.has_down, "down"),
            (step.has_validate, "validate"),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(", ");
        out.push_str(&format!("  v{:<4} {} [{flags}]\n", step.version, step.description));
    }
    out
}
