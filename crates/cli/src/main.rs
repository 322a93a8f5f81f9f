use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use graft_entities::{EntityKind, ProjectIndex, ScanConfig};
use graft_merge::{
    classify_fragment, generate_diff, write_change, ChangeAction, ChangeRequest,
    PendingChangeQueue,
};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::fs_store::FsStore;

mod fs_store;

#[derive(Parser)]
#[command(name = "graft")]
#[command(about = "Stage externally written Python definitions into a project", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Print machine-readable JSON on stdout (implies --quiet)
    #[arg(long, global = true)]
    json: bool,

    /// TOML file with scan settings (extensions, ignored_dirs, ...)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse every source file under a directory and report what was found
    Index(IndexArgs),

    /// Look up the first definition with a given name and kind
    Find(FindArgs),

    /// Classify the definitions of a fragment against a project
    Classify(ClassifyArgs),

    /// Line diff between two files (exit status 1 when they differ)
    Diff(DiffArgs),

    /// Classify a fragment, stage the results and write them to the target file
    Apply(ApplyArgs),
}

#[derive(Args)]
struct IndexArgs {
    /// Project directory
    #[arg(default_value = ".")]
    path: PathBuf,

    /// List every entity instead of the summary
    #[arg(long)]
    list: bool,
}

#[derive(Args)]
struct FindArgs {
    /// Project directory
    path: PathBuf,

    /// Entity name
    name: String,

    /// Entity kind: class, function, async_function, method
    #[arg(long, default_value = "function")]
    kind: EntityKind,
}

#[derive(Args)]
struct ClassifyArgs {
    /// Project directory
    path: PathBuf,

    /// File holding the fragment ("-" reads stdin)
    fragment: PathBuf,

    /// File the fragment is destined for (relative to the project directory)
    #[arg(long)]
    target: PathBuf,

    /// Print a diff preview under every request
    #[arg(long)]
    diff: bool,
}

#[derive(Args)]
struct DiffArgs {
    old: PathBuf,
    new: PathBuf,
}

#[derive(Args)]
struct ApplyArgs {
    /// Project directory
    path: PathBuf,

    /// File holding the fragment ("-" reads stdin)
    fragment: PathBuf,

    /// File the fragment is destined for (relative to the project directory)
    #[arg(long)]
    target: PathBuf,

    /// Write conflicting definitions too
    #[arg(long)]
    accept_conflicts: bool,

    /// Print the staged changes without writing anything
    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    let mut cli = Cli::parse();
    if cli.json {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    let json = cli.json;

    match cli.command {
        Commands::Index(args) => run_index(args, config, json),
        Commands::Find(args) => run_find(args, config, json),
        Commands::Classify(args) => run_classify(args, config, json),
        Commands::Diff(args) => run_diff(args, json),
        Commands::Apply(args) => run_apply(args, config, json),
    }
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    let Some(path) = path else {
        return Ok(ScanConfig::default());
    };
    let config = ScanConfig::from_toml_file(path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    log::debug!("Loaded scan config from {}", path.display());
    Ok(config)
}

fn build_index(path: &Path, config: ScanConfig) -> Result<ProjectIndex> {
    let root = path.canonicalize().context("Invalid project path")?;
    let index = ProjectIndex::build_with_config(&root, config)?;
    let broken = index.error_files().count();
    if broken > 0 {
        log::warn!("{broken} file(s) did not parse and were indexed as parse errors");
    }
    Ok(index)
}

fn read_fragment(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read fragment from stdin")?;
        return Ok(buffer);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read fragment {}", path.display()))
}

fn resolve_target(index: &ProjectIndex, target: &Path) -> String {
    let resolved = if target.is_absolute() {
        target.to_path_buf()
    } else {
        index.root().join(target)
    };
    resolved.to_string_lossy().into_owned()
}

#[derive(Serialize)]
struct EntityRow<'a> {
    path: &'a Path,
    name: &'a str,
    kind: EntityKind,
    start_line: usize,
    end_line: usize,
}

/// Index a project directory
fn run_index(args: IndexArgs, config: ScanConfig, json: bool) -> Result<ExitCode> {
    let index = build_index(&args.path, config)?;

    if args.list {
        let rows: Vec<EntityRow<'_>> = index
            .entities()
            .map(|(path, entity)| EntityRow {
                path: path.strip_prefix(index.root()).unwrap_or(path),
                name: &entity.name,
                kind: entity.kind,
                start_line: entity.start_line,
                end_line: entity.end_line,
            })
            .collect();
        if json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
        } else {
            for row in &rows {
                println!(
                    "{}:{}-{}\t{}\t{}",
                    row.path.display(),
                    row.start_line,
                    row.end_line,
                    row.kind,
                    row.name
                );
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let stats = index.stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!(
            "Indexed {} files ({} with parse errors)",
            stats.files, stats.parse_errors
        );
        for (kind, count) in &stats.entities {
            println!("  {kind}: {count}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Find a definition by name and kind
fn run_find(args: FindArgs, config: ScanConfig, json: bool) -> Result<ExitCode> {
    let index = build_index(&args.path, config)?;

    let Some(found) = index.find(&args.name, args.kind) else {
        if json {
            println!("null");
        } else {
            eprintln!("No {} named '{}'", args.kind, args.name);
        }
        return Ok(ExitCode::FAILURE);
    };

    if json {
        let row = EntityRow {
            path: found.path,
            name: &found.entity.name,
            kind: found.entity.kind,
            start_line: found.entity.start_line,
            end_line: found.entity.end_line,
        };
        println!("{}", serde_json::to_string_pretty(&row)?);
    } else {
        println!(
            "{}:{}-{}",
            found.path.display(),
            found.entity.start_line,
            found.entity.end_line
        );
        println!("{}", found.entity.source_text);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_request(change: &ChangeRequest, with_diff: bool) {
    if change.is_conflict() {
        println!(
            "{} {} {} ({})",
            change.action, change.kind, change.entity_name, change.conflict_reason
        );
    } else {
        println!("{} {} {}", change.action, change.kind, change.entity_name);
    }
    if with_diff {
        print!("{}", change.preview().format_for_display());
        println!();
    }
}

/// Classify a fragment against an indexed project
fn run_classify(args: ClassifyArgs, config: ScanConfig, json: bool) -> Result<ExitCode> {
    let index = build_index(&args.path, config)?;
    let fragment = read_fragment(&args.fragment)?;
    let target = resolve_target(&index, &args.target);

    let changes = classify_fragment(&fragment, &target, &index);
    log::info!("Classified {} definition(s) for {target}", changes.len());

    if json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
    } else {
        for change in &changes {
            print_request(change, args.diff);
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Compare two files line by line
fn run_diff(args: DiffArgs, json: bool) -> Result<ExitCode> {
    let old = fs::read_to_string(&args.old)
        .with_context(|| format!("Failed to read {}", args.old.display()))?;
    let new = fs::read_to_string(&args.new)
        .with_context(|| format!("Failed to read {}", args.new.display()))?;

    let diff = generate_diff(&old, &new);
    if json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
    } else {
        print!("{}", diff.format_for_display());
    }

    if diff.has_changes() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

#[derive(Serialize)]
struct ApplyReport {
    success: bool,
    dry_run: bool,
    messages: Vec<String>,
    changes: Vec<ChangeRequest>,
}

/// Classify a fragment and write the staged changes through the filesystem
fn run_apply(args: ApplyArgs, config: ScanConfig, json: bool) -> Result<ExitCode> {
    let index = build_index(&args.path, config)?;
    let fragment = read_fragment(&args.fragment)?;
    let target = resolve_target(&index, &args.target);

    let mut queue = PendingChangeQueue::new();
    queue.extend(classify_fragment(&fragment, &target, &index));

    let conflicts: Vec<String> = queue
        .unresolved_conflicts()
        .map(|c| format!("{}: {}", c.entity_name, c.conflict_reason))
        .collect();
    if !conflicts.is_empty() && !args.accept_conflicts {
        if json {
            let report = ApplyReport {
                success: false,
                dry_run: args.dry_run,
                messages: conflicts,
                changes: queue.get_pending().iter().map(|c| c.request()).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            eprintln!("Refusing to apply: {} conflict(s) queued", conflicts.len());
            for conflict in &conflicts {
                eprintln!("  {conflict}");
            }
            eprintln!("Re-run with --accept-conflicts to write them anyway.");
        }
        return Ok(ExitCode::FAILURE);
    }

    // A module-level syntax conflict has nothing sensible to write
    if queue
        .get_pending()
        .iter()
        .any(|c| c.action == ChangeAction::Conflict && c.kind == EntityKind::ModuleError)
    {
        anyhow::bail!("Fragment does not parse; nothing to apply");
    }

    if !json {
        for change in queue.get_pending() {
            print_request(&change.request(), args.dry_run);
        }
    }

    let store = FsStore::new(args.dry_run);
    let outcome = queue.apply_with(|change| write_change(&store, change));

    if json {
        let report = ApplyReport {
            success: outcome.success,
            dry_run: args.dry_run,
            messages: outcome.messages.clone(),
            changes: outcome.applied.iter().map(|c| c.request()).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for message in &outcome.messages {
            eprintln!("{message}");
        }
    }

    if outcome.success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
