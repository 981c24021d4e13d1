use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use workshop_assign::config::{parse_cutoff, Config};
use workshop_assign::display::{print_check_results, write_assignments_to_file, write_report_to_file};
use workshop_assign::parser::{load_forced, load_preferences, load_schedule, Domain};
use workshop_assign::schedule::{
    check_individually, Feasibility, ForcedAssignment, MicroLpEngine, RandomFillPolicy, Sequencer,
};

#[derive(Parser)]
#[command(
    name = "workshop-assign",
    version,
    about = "Assigns students to workshops by preference rank, cohort by cohort",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve every cohort and write the assignment table
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// Assignment CSV to write
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON run report to write
        #[arg(long)]
        report: Option<PathBuf>,

        /// Skip naming the failing participant when a cohort is infeasible
        #[arg(long)]
        no_diagnosis: bool,
    },

    /// Check each participant alone against the capacity left after forced placements
    Check {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Workshop schedule CSV
    #[arg(long)]
    schedule: Option<PathBuf>,

    /// Student preference CSV
    #[arg(long)]
    preferences: Option<PathBuf>,

    /// Forced placement CSV
    #[arg(long)]
    forced: Option<PathBuf>,

    /// Cohort boundary (repeatable), e.g. 2025-06-23 or 2025-06-23T12:00:00
    #[arg(long = "cutoff", value_parser = parse_cutoff)]
    cutoffs: Vec<NaiveDateTime>,

    /// Solver time budget per cohort, in seconds
    #[arg(long)]
    time_limit: Option<u64>,

    /// Rule for how many unranked workshops a student may get per zone
    #[arg(long, value_enum)]
    random_fill: Option<RandomFillArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum RandomFillArg {
    PreferenceShortfall,
    NoSecondChoices,
}

impl InputArgs {
    fn apply(self, config: &mut Config) {
        if let Some(path) = self.schedule {
            config.input.schedule = path;
        }
        if let Some(path) = self.preferences {
            config.input.preferences = path;
        }
        if self.forced.is_some() {
            config.input.forced = self.forced;
        }
        if !self.cutoffs.is_empty() {
            config.cohorts.cutoffs = self.cutoffs;
        }
        if let Some(secs) = self.time_limit {
            config.solver.time_limit_secs = secs;
        }
        if let Some(policy) = self.random_fill {
            config.solver.random_fill = match policy {
                RandomFillArg::PreferenceShortfall => RandomFillPolicy::PreferenceShortfall,
                RandomFillArg::NoSecondChoices => RandomFillPolicy::NoSecondChoices,
            };
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(&cli.log_format, cli.verbose)?;

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Run {
            input,
            output,
            report,
            no_diagnosis,
        } => {
            input.apply(&mut config);
            if let Some(path) = output {
                config.output.assignments = path;
            }
            if report.is_some() {
                config.output.report = report;
            }
            if no_diagnosis {
                config.cohorts.diagnose_on_failure = false;
            }
            config.validate()?;
            run(&config)
        }
        Commands::Check { input } => {
            input.apply(&mut config);
            config.validate()?;
            check(&config)
        }
    }
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("workshop_assign=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("workshop_assign=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}

fn load(config: &Config) -> Result<(Domain, Vec<ForcedAssignment>)> {
    let schedule = load_schedule(&config.input.schedule)
        .with_context(|| format!("Loading schedule {}", config.input.schedule.display()))?;
    let preferences = load_preferences(&config.input.preferences)
        .with_context(|| format!("Loading preferences {}", config.input.preferences.display()))?;
    let forced = match &config.input.forced {
        Some(path) => load_forced(path)
            .with_context(|| format!("Loading forced placements {}", path.display()))?,
        None => Vec::new(),
    };

    tracing::info!(
        slots = schedule.slots.len(),
        days = schedule.days.len(),
        participants = preferences.submitted.len(),
        skipped_rows = preferences.skipped_rows,
        forced = forced.len(),
        "Loaded input"
    );

    let domain = Domain::assemble(schedule, preferences)?;
    Ok((domain, forced))
}

fn run(config: &Config) -> Result<()> {
    let (domain, forced) = load(config)?;
    let options = config.solve_options();
    let engine = MicroLpEngine;

    let mut sequencer = Sequencer::new(&domain, &options, &engine)
        .with_diagnosis(config.cohorts.diagnose_on_failure);
    let report = sequencer.run(&forced, &config.cohorts.cutoffs)?;

    if !report.duplicates.is_empty() {
        tracing::warn!(
            duplicates = report.duplicates.len(),
            "Found duplicate assignments; they are kept in the output"
        );
    }

    write_assignments_to_file(&config.output.assignments, &report.assignments).with_context(|| {
        format!("Writing assignments to {}", config.output.assignments.display())
    })?;
    if let Some(path) = &config.output.report {
        write_report_to_file(path, &report)
            .with_context(|| format!("Writing report to {}", path.display()))?;
    }

    tracing::info!(
        rows = report.assignments.len(),
        output = %config.output.assignments.display(),
        "Solved sequentially, assignments saved"
    );
    Ok(())
}

fn check(config: &Config) -> Result<()> {
    let (domain, forced) = load(config)?;
    let options = config.solve_options();
    let engine = MicroLpEngine;

    let mut sequencer = Sequencer::new(&domain, &options, &engine);
    sequencer.apply_forced(&forced)?;

    let mut failing = 0;
    let mut undetermined = 0;
    for cohort in sequencer.cohorts(&config.cohorts.cutoffs) {
        let results =
            check_individually(sequencer.solver(), &cohort.members, sequencer.capacity())?;
        for result in &results {
            match result.outcome {
                Feasibility::Feasible => {}
                Feasibility::Infeasible => failing += 1,
                Feasibility::Undetermined => undetermined += 1,
            }
        }
        print_check_results(&cohort, &results);
    }

    tracing::info!(failing, undetermined, "Feasibility check finished");
    Ok(())
}
