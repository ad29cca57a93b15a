use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use easyprof::error::Error;
use easyprof::report::{FormatOptions, Run, format_run, format_table, load_run, save_run};
use easyprof::workload;
use easyprof_runtime::{Collector, SortBy};

#[derive(Parser)]
#[command(
    name = "easyprof",
    about = "In-process call-tree profiler: call counts, self time, and total time per call site",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Profile the built-in demo workload and print the results.
    Demo {
        /// Number of workload rounds (3x bar() and factorial(13) each).
        #[arg(long, default_value_t = 31_142)]
        iterations: usize,

        /// Column to sort by, descending.
        #[arg(long, value_enum, default_value_t = SortKey::Internal)]
        sort: SortKey,

        /// Also write the results to this JSON file.
        #[arg(long, value_name = "PATH")]
        json: Option<PathBuf>,

        /// Hide the per-call mean columns.
        #[arg(long)]
        no_per_call: bool,
    },
    /// Print a run file written by `easyprof demo --json`.
    Report {
        /// Path to the run file.
        run: PathBuf,

        /// Column to sort by, descending.
        #[arg(long, value_enum, default_value_t = SortKey::Internal)]
        sort: SortKey,

        /// Hide the per-call mean columns.
        #[arg(long)]
        no_per_call: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortKey {
    /// Self time.
    Internal,
    /// Total time, including callees.
    Cumulative,
    /// Call count.
    Calls,
}

impl From<SortKey> for SortBy {
    fn from(key: SortKey) -> Self {
        match key {
            SortKey::Internal => SortBy::Internal,
            SortKey::Cumulative => SortBy::Cumulative,
            SortKey::Calls => SortBy::Calls,
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Commands::Demo {
            iterations,
            sort,
            json,
            no_per_call,
        } => cmd_demo(iterations, sort.into(), json, no_per_call),
        Commands::Report {
            run,
            sort,
            no_per_call,
        } => cmd_report(run, sort.into(), no_per_call),
    }
}

fn format_options(no_per_call: bool) -> FormatOptions {
    FormatOptions {
        show_per_call: !no_per_call,
        ..FormatOptions::default()
    }
}

fn cmd_demo(
    iterations: usize,
    sort: SortBy,
    json: Option<PathBuf>,
    no_per_call: bool,
) -> Result<(), Error> {
    eprintln!("Simulating work. Just give it a bit...");

    let collector = Collector::new();
    easyprof_runtime::start(&collector);
    workload::run(iterations);
    easyprof_runtime::stop();

    let results = collector.results_sorted(sort);
    log::debug!(
        "collected {} call sites, {} calls",
        results.len(),
        results.total_calls()
    );

    if let Some(path) = json {
        save_run(&Run::from_results(&results), &path)?;
        eprintln!("wrote: {}", path.display());
    }

    anstream::print!("{}", format_table(&results, &format_options(no_per_call)));
    Ok(())
}

fn cmd_report(path: PathBuf, sort: SortBy, no_per_call: bool) -> Result<(), Error> {
    let mut run = load_run(&path)?;
    log::debug!("loaded {} entries from {}", run.functions.len(), path.display());
    run.sort(sort);
    anstream::print!("{}", format_run(&run, &format_options(no_per_call)));
    Ok(())
}
