use anyhow::Context;
use cdn_updater_core::{DistributionUpdater, TaskType, UpdateOutcome, UpdaterConfig};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod edits;
mod snapshot;

use edits::{build_workers, parse_assignment, FieldEdit};
use snapshot::SnapshotApi;

fn cli() -> Command {
    let snapshot = Arg::new("snapshot")
        .long("snapshot")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("JSON snapshot of distributions to operate on");

    Command::new("cdn-updater")
        .version(cdn_updater_core::VERSION)
        .about("Batch update CDN distribution configs")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level (RUST_LOG takes precedence)"),
        )
        .subcommand(
            Command::new("list")
                .about("List every distribution as JSON lines")
                .arg(snapshot.clone()),
        )
        .subcommand(
            Command::new("apply")
                .about("Apply field edits to one or all distributions")
                .arg(snapshot)
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML updater config"),
                )
                .arg(
                    Arg::new("set")
                        .long("set")
                        .action(ArgAction::Append)
                        .value_name("FIELD=VALUE")
                        .help("Set a top-level field (VALUE is JSON or a plain string)"),
                )
                .arg(
                    Arg::new("unset")
                        .long("unset")
                        .action(ArgAction::Append)
                        .value_name("FIELD")
                        .help("Remove a top-level field"),
                )
                .arg(
                    Arg::new("id")
                        .long("id")
                        .conflicts_with("match")
                        .help("Update a single distribution"),
                )
                .arg(
                    Arg::new("match")
                        .long("match")
                        .action(ArgAction::Append)
                        .value_name("FIELD=VALUE")
                        .help("Only update distributions whose listing summary matches"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Compute and print the diff without committing"),
                )
                .arg(
                    Arg::new("allow-sensitive-action")
                        .long("allow-sensitive-action")
                        .action(ArgAction::SetTrue)
                        .help("Permit changes to the Enabled field"),
                )
                .arg(
                    Arg::new("parallel")
                        .long("parallel")
                        .value_parser(value_parser!(usize))
                        .value_name("N")
                        .help("Run up to N updates concurrently"),
                ),
        )
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn load_config(args: &ArgMatches) -> anyhow::Result<UpdaterConfig> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read config {}", path.display()))?;
            UpdaterConfig::from_toml_str(&raw)?
        }
        None => UpdaterConfig::default(),
    };

    if args.get_flag("dry-run") {
        config.debug_mode = true;
    }
    if args.get_flag("allow-sensitive-action") {
        config.allow_sensitive_action = true;
    }
    if let Some(limit) = args.get_one::<usize>("parallel") {
        config = config.parallel(*limit);
    }
    config.validate()?;

    Ok(config)
}

fn collect_edits(args: &ArgMatches) -> anyhow::Result<Vec<FieldEdit>> {
    let mut edits = Vec::new();
    for raw in args.get_many::<String>("set").into_iter().flatten() {
        let (field, value) = parse_assignment(raw)?;
        edits.push(FieldEdit::Set(field, value));
    }
    for field in args.get_many::<String>("unset").into_iter().flatten() {
        edits.push(FieldEdit::Unset(field.clone()));
    }
    Ok(edits)
}

async fn run_list(args: &ArgMatches) -> anyhow::Result<()> {
    let Some(path) = args.get_one::<PathBuf>("snapshot") else {
        anyhow::bail!("--snapshot is required");
    };
    let api = Arc::new(SnapshotApi::open(path).await?);
    let updater = DistributionUpdater::new(
        build_workers(Vec::new(), Vec::new()),
        UpdaterConfig::default(),
        api,
    )?;

    for summary in updater.list_all_distributions().await? {
        println!("{}", serde_json::to_string(&summary)?);
    }
    Ok(())
}

async fn run_apply(args: &ArgMatches) -> anyhow::Result<()> {
    let Some(path) = args.get_one::<PathBuf>("snapshot") else {
        anyhow::bail!("--snapshot is required");
    };
    let config = load_config(args).await?;
    let edits = collect_edits(args)?;
    if edits.is_empty() {
        anyhow::bail!("nothing to do: pass at least one --set or --unset");
    }
    let matches = args
        .get_many::<String>("match")
        .into_iter()
        .flatten()
        .map(|raw| parse_assignment(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let api = Arc::new(SnapshotApi::open(path).await?);
    let dry_run = config.debug_mode;
    if config.task_type == TaskType::Parallel {
        tracing::info!("Parallel mode, concurrency limit {}", config.concurrency_limit);
    }
    let updater = DistributionUpdater::new(build_workers(edits, matches), config, api)?;

    match args.get_one::<String>("id") {
        Some(id) => match updater.update_distribution(id).await? {
            UpdateOutcome::DryRun(diff) => println!("{}", serde_json::to_string_pretty(&diff)?),
            UpdateOutcome::Unchanged => println!("{id}: no change"),
            UpdateOutcome::Committed => println!("{id}: updated"),
        },
        None => {
            let report = updater.update_all_distributions().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if dry_run {
                if let Some(diff) = updater.diff() {
                    println!("{}", serde_json::to_string_pretty(&diff)?);
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    match matches.subcommand() {
        Some(("list", args)) => run_list(args).await,
        Some(("apply", args)) => run_apply(args).await,
        _ => Ok(()),
    }
}
