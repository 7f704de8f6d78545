//! `formscan` command-line entry point.
//!
//! # Responsibility
//! - Parse arguments into one `ReconcileConfig` and run the core pipeline.
//! - Map fatal errors to a non-zero exit status with a readable diagnostic.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use formscan_core::config::{
    DEFAULT_CATEGORY_MARKER, DEFAULT_LOCAL_STORE_FILE, DEFAULT_PAGE_SIZE, DEFAULT_STAGE,
};
use formscan_core::model::record::FORM_KEY_ATTRIBUTE;
use formscan_core::{
    default_log_level, init_logging, run_reconcile, seed_collection, DanglingPolicy, LogTarget,
    ReconcileConfig,
};
use log::info;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "formscan",
    version,
    about = "Report forms that have no answers"
)]
struct Cli {
    /// Log level: trace|debug|info|warn|error
    #[arg(long, global = true, env = "FORMSCAN_LOG_LEVEL")]
    log_level: Option<String>,
    /// Absolute directory for rotating log files (default: stderr only)
    #[arg(long, global = true, value_name = "DIR", env = "FORMSCAN_LOG_DIR")]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan forms and answers and write the missing-form reports
    Run(RunArgs),
    /// Load JSON-lines fixtures into a local store collection
    Seed(SeedArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Deployment stage label (master/val/production)
    #[arg(long, default_value = DEFAULT_STAGE, env = "FORMSCAN_STAGE")]
    stage: String,
    /// Read the local-development store instead of the remote one
    #[arg(long, env = "FORMSCAN_RUN_LOCAL")]
    local: bool,
    /// Remote store location (required without --local)
    #[arg(long, value_name = "PATH", env = "FORMSCAN_STORE")]
    store: Option<PathBuf>,
    /// Local-development store location
    #[arg(long, value_name = "PATH", default_value = DEFAULT_LOCAL_STORE_FILE, env = "FORMSCAN_LOCAL_STORE")]
    local_store: PathBuf,
    /// Substring excluded from the filtered report
    #[arg(long, default_value = DEFAULT_CATEGORY_MARKER)]
    marker: String,
    /// Directory receiving both report files
    #[arg(long, value_name = "DIR", default_value = ".")]
    out_dir: PathBuf,
    /// Items requested per page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,
    /// How to treat answers that reference unknown forms
    #[arg(long, value_enum, default_value_t = DanglingArg::Warn)]
    dangling: DanglingArg,
}

#[derive(Args)]
struct SeedArgs {
    /// Store file to create or extend
    #[arg(long, value_name = "PATH", default_value = DEFAULT_LOCAL_STORE_FILE)]
    store: PathBuf,
    /// Target collection, e.g. `local-state-forms`
    #[arg(long)]
    collection: String,
    /// Attribute whose value keys each item
    #[arg(long, default_value = FORM_KEY_ATTRIBUTE)]
    key_attribute: String,
    /// JSON-lines input file (`-` for stdin)
    #[arg(long, value_name = "PATH")]
    file: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum DanglingArg {
    Warn,
    Strict,
}

impl From<DanglingArg> for DanglingPolicy {
    fn from(value: DanglingArg) -> Self {
        match value {
            DanglingArg::Warn => DanglingPolicy::Warn,
            DanglingArg::Strict => DanglingPolicy::Strict,
        }
    }
}

impl From<RunArgs> for ReconcileConfig {
    fn from(args: RunArgs) -> Self {
        Self {
            stage: args.stage,
            run_local: args.local,
            store_path: args.store,
            local_store_path: args.local_store,
            category_marker: args.marker,
            output_dir: args.out_dir,
            page_size: args.page_size,
            dangling_policy: args.dangling.into(),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("formscan: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let level = cli
        .log_level
        .unwrap_or_else(|| default_log_level().to_string());
    let target = cli.log_dir.map_or(LogTarget::Stderr, LogTarget::Directory);
    init_logging(&level, target).map_err(|err| anyhow!(err))?;

    match cli.command {
        Commands::Run(args) => {
            info!("event=cli_command module=cli status=start command=run");
            run(args.into())
        }
        Commands::Seed(args) => {
            info!("event=cli_command module=cli status=start command=seed");
            seed(args)
        }
    }
}

fn run(config: ReconcileConfig) -> Result<()> {
    let outcome = run_reconcile(&config)
        .map_err(|err| anyhow!("{} stage failed: {err}", err.stage()))?;
    let reconciliation = &outcome.reconciliation;

    println!("forms scanned: {}", reconciliation.forms.items);
    println!("answers scanned: {}", reconciliation.answers.items);
    println!("total missing: {}", reconciliation.report.all().len());
    println!(
        "missing without `{}`: {}",
        reconciliation.report.marker(),
        reconciliation.report.without_marker().len()
    );
    if !reconciliation.mark.dangling.is_empty() {
        println!(
            "dangling answers: {} (e.g. {})",
            reconciliation.mark.dangling.occurrences,
            reconciliation.mark.dangling.samples().join(", ")
        );
    }
    for path in &outcome.published {
        println!("wrote {}", path.display());
    }
    println!("--- {:.3} seconds ---", outcome.elapsed.as_secs_f64());
    Ok(())
}

fn seed(args: SeedArgs) -> Result<()> {
    let result = if args.file.as_os_str() == "-" {
        seed_collection(
            &args.store,
            &args.collection,
            &args.key_attribute,
            io::stdin().lock(),
        )
    } else {
        let file = File::open(&args.file)
            .with_context(|| format!("cannot open seed file `{}`", args.file.display()))?;
        seed_collection(
            &args.store,
            &args.collection,
            &args.key_attribute,
            BufReader::new(file),
        )
    };
    let written = result.with_context(|| format!("seeding `{}` failed", args.collection))?;

    println!(
        "seeded {written} item(s) into `{}` at {}",
        args.collection,
        args.store.display()
    );
    Ok(())
}
