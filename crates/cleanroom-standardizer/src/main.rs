//! CLI entry point for the value standardizer.

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use cleanroom_standardizer::reporting::SessionReport;
use cleanroom_standardizer::{
    AnalysisReport, ColumnRef, ExportReport, FeedbackEntry, GenerationReport, GroupId,
    RefinementReport, Session, Standardizer, StandardizerConfig, Warning,
};
use dotenv::dotenv;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};

#[cfg(feature = "ai")]
use cleanroom_standardizer::ai::{AIProvider, EndpointConfig, GeminiProvider, OpenRouterProvider};
#[cfg(feature = "ai")]
use std::env;
#[cfg(feature = "ai")]
use std::sync::Arc;

/// LLM backend selectable from the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliProvider {
    /// OpenRouter chat completions (OPENROUTER_API_KEY)
    Openrouter,
    /// Google Gemini (GEMINI_API_KEY)
    Gemini,
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "LLM-assisted standardization of string values across tabular files",
    long_about = "Groups equivalent columns across CSV and Excel files, proposes a canonical \
                  value for every distinct string, and refines the mappings with your \
                  corrections until you finish.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  OPENROUTER_API_KEY    API key for OpenRouter\n  \
                  GEMINI_API_KEY        API key for Google Gemini\n\n\
                  EXAMPLES:\n  \
                  # Interactive review of two files\n  \
                  cleanroom -i sales.csv -i stock.xlsx\n\n  \
                  # Scripted feedback rounds, then export\n  \
                  cleanroom -i sales.csv -i stock.csv --feedback-file rounds.json\n\n  \
                  # Rule-based mode (no AI), accept the first mappings\n  \
                  cleanroom -i sales.csv -i stock.csv --no-ai --yes\n\n  \
                  # Map a hand-picked group instead of auto-detected group 2\n  \
                  cleanroom -i sales.csv -i stock.csv --drop-group 2 \\\n    \
                  --group 'sales.csv::Region,stock.csv::area' --yes"
)]
struct Args {
    /// Input CSV or Excel file (repeatable)
    #[arg(short, long, required = true)]
    input: Vec<PathBuf>,

    /// Excel sheet to load (repeatable); all sheets when omitted
    #[arg(long)]
    sheet: Vec<String>,

    /// Output directory for the exported workbooks
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// LLM provider
    #[arg(long, value_enum, default_value = "openrouter")]
    provider: CliProvider,

    /// Model name passed to the provider
    #[arg(long)]
    model: Option<String>,

    /// Disable the LLM (rule-based grouping and identity mappings)
    #[arg(long, default_value = "false")]
    no_ai: bool,

    /// Maximum number of concurrent mapping requests
    #[arg(long, default_value = "5")]
    max_workers: usize,

    /// Minimum number of columns for an auto-detected group to be mapped
    #[arg(long, default_value = "2")]
    min_group_size: usize,

    /// Extra group to map, as comma-separated dataset::column labels (repeatable)
    #[arg(long = "group", value_name = "COLUMNS")]
    groups: Vec<String>,

    /// Auto-detected group number to leave out (repeatable)
    #[arg(long = "drop-group", value_name = "N")]
    drop_groups: Vec<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// JSON file with scripted feedback rounds
    ///
    /// An array of rounds; each round maps a mapping key such as
    /// "Column Group 1 - sales.csv: Brand" to a list of
    /// {"original": ..., "corrected": ...} objects.
    #[arg(long)]
    feedback_file: Option<PathBuf>,

    /// Finish right after generation (and scripted rounds) without prompting
    #[arg(long)]
    yes: bool,

    /// Output the final session report as JSON to stdout
    ///
    /// Disables all logs and the interactive review.
    #[arg(long)]
    json: bool,
}

/// Scripted feedback: one map per round, keyed by mapping label.
type FeedbackRounds = Vec<BTreeMap<String, Vec<FeedbackEntry>>>;

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);
    dotenv().ok();

    for path in &args.input {
        if !path.exists() {
            return Err(anyhow!("Input file not found: {}", path.display()));
        }
    }

    let config = StandardizerConfig::builder()
        .output_dir(&args.output)
        .max_workers(args.max_workers)
        .min_auto_group_size(args.min_group_size)
        .build()?;
    let standardizer = build_standardizer(&args, config)?;

    let mut session = Session::new();
    run_session(&standardizer, &mut session, &args)
}

fn run_session(standardizer: &Standardizer, session: &mut Session, args: &Args) -> Result<()> {
    let loaded = standardizer.load_files(session, &args.input, &args.sheet)?;
    info!("Loaded {} dataset(s)", loaded.len());

    let analysis = standardizer.analyze(session)?;
    if !args.json {
        print_analysis(&analysis);
    }

    let interactive = !(args.yes || args.json || args.feedback_file.is_some());
    apply_group_flags(session, args)?;
    if interactive {
        run_group_loop(session)?;
    }

    let generation = standardizer.generate_mappings(session)?;
    if !args.json {
        print_generation(&generation);
    }

    if let Some(path) = &args.feedback_file {
        let rounds: FeedbackRounds = serde_json::from_str(&std::fs::read_to_string(path)?)
            .map_err(|e| anyhow!("Invalid feedback file {}: {}", path.display(), e))?;
        for round in rounds {
            queue_round(session, round);
            let report = standardizer.process_feedback(session)?;
            if !args.json {
                print_refinement(&report);
            }
        }
    }

    if interactive {
        run_review_loop(standardizer, session)?;
    }

    standardizer.finish(session)?;
    let export = standardizer.export(session)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&SessionReport::from_session(session))?);
    } else {
        print_export(&export, session);
    }

    if export.is_complete() {
        Ok(())
    } else {
        Err(anyhow!("Export finished with errors"))
    }
}

/// Apply `--drop-group` and `--group` before mappings are generated.
fn apply_group_flags(session: &mut Session, args: &Args) -> Result<()> {
    for &index in &args.drop_groups {
        let removed = session.remove_group(GroupId::auto(index))?;
        info!("Dropped {}", removed.id);
    }
    for spec in &args.groups {
        let id = session.add_group_with_columns(parse_columns(spec)?)?;
        info!("Added {} from '{}'", id, spec);
    }
    Ok(())
}

/// Comma-separated column labels.
fn parse_columns(spec: &str) -> Result<Vec<ColumnRef>> {
    let columns = spec
        .split(',')
        .filter(|label| !label.trim().is_empty())
        .map(str::parse::<ColumnRef>)
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if columns.is_empty() {
        return Err(anyhow!("'{}' names no columns", spec));
    }
    Ok(columns)
}

/// `3` is auto-detected group 3, `c2` is custom group 2.
fn parse_group_ref(text: &str) -> Result<GroupId> {
    let text = text.trim();
    let (custom, number) = match text.strip_prefix(['c', 'C']) {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let index: usize = number
        .parse()
        .map_err(|_| anyhow!("'{}' is not a group number", text))?;
    Ok(if custom { GroupId::custom(index) } else { GroupId::auto(index) })
}

/// Queue one scripted round. Unknown keys and invalid corrections are
/// skipped with a warning.
fn queue_round(session: &mut Session, round: BTreeMap<String, Vec<FeedbackEntry>>) {
    for (label, entries) in round {
        let Some(identity) = session.find_identity(&label).cloned() else {
            warn!("Feedback for unknown mapping '{}' skipped", label);
            continue;
        };
        for entry in entries {
            if let Err(e) = session.add_feedback(&identity, entry) {
                warn!("{}", e);
            }
        }
    }
}

/// Build the standardizer with optional AI support
#[cfg(feature = "ai")]
fn build_standardizer(args: &Args, config: StandardizerConfig) -> Result<Standardizer> {
    if args.no_ai {
        info!("Running in rule-based mode (AI disabled)");
        return build_standardizer_without_ai(args, config);
    }

    let (key_var, name) = match args.provider {
        CliProvider::Openrouter => ("OPENROUTER_API_KEY", "OpenRouter"),
        CliProvider::Gemini => ("GEMINI_API_KEY", "Gemini"),
    };
    let api_key = match env::var(key_var) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            warn!("{} not set. Falling back to rule-based mode.", key_var);
            return build_standardizer_without_ai(args, config);
        }
    };

    let mut endpoint = match args.provider {
        CliProvider::Openrouter => EndpointConfig::openrouter(),
        CliProvider::Gemini => EndpointConfig::gemini(),
    };
    if let Some(model) = &args.model {
        endpoint = endpoint.model(model);
    }
    let endpoint = endpoint.build();
    let provider: Arc<dyn AIProvider> = match args.provider {
        CliProvider::Openrouter => Arc::new(OpenRouterProvider::with_config(api_key, endpoint)?),
        CliProvider::Gemini => Arc::new(GeminiProvider::with_config(api_key, endpoint)?),
    };
    info!(
        "Running with {} ({})",
        name,
        provider.model().unwrap_or("default model")
    );

    let mut builder = Standardizer::builder().config(config).ai_provider(provider);
    if !args.quiet && !args.json {
        builder = builder.on_progress(log_progress);
    }
    Ok(builder.build()?)
}

/// Build the standardizer without AI support (fallback when "ai" feature is disabled)
#[cfg(not(feature = "ai"))]
fn build_standardizer(args: &Args, config: StandardizerConfig) -> Result<Standardizer> {
    if !args.no_ai {
        warn!("AI support not compiled in. Using rule-based mode.");
        warn!("Compile with --features ai to enable AI support.");
    }
    build_standardizer_without_ai(args, config)
}

fn build_standardizer_without_ai(args: &Args, config: StandardizerConfig) -> Result<Standardizer> {
    let mut builder = Standardizer::builder().config(config);
    if !args.quiet && !args.json {
        builder = builder.on_progress(log_progress);
    }
    Ok(builder.build()?)
}

fn log_progress(update: cleanroom_standardizer::ProgressUpdate) {
    info!(
        "[{:.0}%] {}: {}",
        update.progress * 100.0,
        update.stage.display_name(),
        update.message
    );
}

// =============================================================================
// Interactive group editing
// =============================================================================

const GROUP_HELP: &str = "Group commands:
  groups                        list the groups that will be mapped
  add <dataset::column>,...     add a custom group
  drop <n>                      remove group <n> (c<n> for a custom group)
  reset                         restore the groups found by analysis
  generate                      generate mappings for the current groups
  help                          show this help";

/// Read group commands from stdin until `generate` or end of input.
fn run_group_loop(session: &mut Session) -> Result<()> {
    println!("\n{GROUP_HELP}\n");
    print_groups(session);
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("groups [{}]> ", session.groups().len());
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            return Ok(());
        };
        let line = line?;
        let (command, rest) = line
            .trim()
            .split_once(char::is_whitespace)
            .unwrap_or((line.trim(), ""));

        let outcome = match command {
            "" => Ok(()),
            "groups" => {
                print_groups(session);
                Ok(())
            }
            "add" => parse_columns(rest).and_then(|columns| {
                let id = session.add_group_with_columns(columns)?;
                println!("Added {id}");
                Ok(())
            }),
            "drop" => parse_group_ref(rest).and_then(|id| {
                session.remove_group(id)?;
                println!("Removed {id}");
                Ok(())
            }),
            "reset" => session.reset_groups().map_err(Into::into),
            "generate" => return Ok(()),
            "help" => {
                println!("{GROUP_HELP}");
                Ok(())
            }
            other => {
                println!("Unknown command '{other}'; type 'help'");
                Ok(())
            }
        };
        if let Err(e) = outcome {
            println!("Error: {e}");
        }
    }
}

fn print_groups(session: &Session) {
    if session.groups().is_empty() {
        println!("  No groups; add one with 'add <dataset::column>,...'");
    }
    for group in session.groups() {
        let columns: Vec<String> = group.columns.iter().map(ToString::to_string).collect();
        println!("  {}: {}", group.id, columns.join(", "));
    }
}

// =============================================================================
// Interactive review
// =============================================================================

const REVIEW_HELP: &str = "Commands:
  show                          list every mapping with its number
  fb <n> <original>=<corrected> queue a correction for mapping <n>
  clear                         drop all queued corrections
  process                       send queued corrections and start the next round
  finish                        accept the mappings and export
  help                          show this help";

/// Read review commands from stdin until `finish` or end of input.
fn run_review_loop(standardizer: &Standardizer, session: &mut Session) -> Result<()> {
    println!("\n{REVIEW_HELP}\n");
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("review [iteration {}, {} queued]> ", session.iteration(), session.pending_feedback());
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            return Ok(());
        };
        let line = line?;
        let (command, rest) = line
            .trim()
            .split_once(char::is_whitespace)
            .unwrap_or((line.trim(), ""));

        match command {
            "" => {}
            "show" => print_mappings(session),
            "fb" => match queue_correction(session, rest) {
                Ok(message) => println!("{message}"),
                Err(e) => println!("Error: {e}"),
            },
            "clear" => {
                session.clear_feedback();
                println!("Queued corrections cleared");
            }
            "process" => match standardizer.process_feedback(session) {
                Ok(report) => print_refinement(&report),
                Err(e) => println!("Error: {e}"),
            },
            "finish" => return Ok(()),
            "help" => println!("{REVIEW_HELP}"),
            other => println!("Unknown command '{other}'; type 'help'"),
        }
    }
}

/// Parse `<n> <original>=<corrected>` and queue it.
fn queue_correction(session: &mut Session, args: &str) -> Result<String> {
    let (number, pair) = args
        .trim()
        .split_once(char::is_whitespace)
        .ok_or_else(|| anyhow!("usage: fb <n> <original>=<corrected>"))?;
    let index: usize = number
        .parse()
        .map_err(|_| anyhow!("'{}' is not a mapping number", number))?;
    let identity = index
        .checked_sub(1)
        .and_then(|i| session.mappings().keys().nth(i))
        .cloned()
        .ok_or_else(|| anyhow!("No mapping number {}", index))?;
    let (original, corrected) = pair
        .split_once('=')
        .ok_or_else(|| anyhow!("usage: fb <n> <original>=<corrected>"))?;
    let entry = FeedbackEntry::new(original.trim(), corrected.trim());
    let message = format!("Queued '{}' -> '{}' for {}", entry.original, entry.corrected, identity);
    session.add_feedback(&identity, entry)?;
    Ok(message)
}

// =============================================================================
// Summaries
// =============================================================================

fn print_warnings(warnings: &[Warning]) {
    if warnings.is_empty() {
        return;
    }
    println!("WARNINGS");
    println!("{}", "-".repeat(40));
    for warning in warnings {
        println!("  - {warning}");
    }
    println!();
}

fn print_analysis(report: &AnalysisReport) {
    println!("\n{}", "=".repeat(80));
    println!("COLUMN ANALYSIS");
    println!("{}\n", "=".repeat(80));

    println!("DATASETS");
    println!("{}", "-".repeat(40));
    println!("{:<40} {:>10} {:>10} {:>12}", "Name", "Rows", "Columns", "Memory (KB)");
    for dataset in &report.datasets {
        println!(
            "{:<40} {:>10} {:>10} {:>12.1}",
            dataset.name, dataset.rows, dataset.columns, dataset.memory_kb
        );
    }
    println!();

    println!(
        "{} eligible column(s) in {} group(s){}",
        report.eligible_columns,
        report.groups.len(),
        if report.used_fallback { " (fallback: one group per column)" } else { "" }
    );
    println!();

    println!("SELECTED GROUPS");
    println!("{}", "-".repeat(40));
    if report.selected.is_empty() {
        println!("  No group has enough columns to be mapped");
    }
    for group in &report.selected {
        println!("  {} ({} unique values)", group.name, group.total_unique_values);
        for line in &group.samples {
            println!("    {line}");
        }
    }
    println!();
    print_warnings(&report.warnings);
}

fn print_generation(report: &GenerationReport) {
    println!("{}", "=".repeat(80));
    println!(
        "MAPPINGS GENERATED: {} succeeded, {} failed, {} empty column(s) skipped ({} ms)",
        report.succeeded, report.failed, report.skipped_empty, report.duration_ms
    );
    println!("{}\n", "=".repeat(80));
    for row in &report.stats {
        println!(
            "  {:<60} {:>4} -> {:<4} ({:.1}% reduction)",
            row.key,
            row.stats.original_count,
            row.stats.standardized_count,
            row.stats.reduction_percentage
        );
    }
    println!();
    print_warnings(&report.warnings);
}

fn print_refinement(report: &RefinementReport) {
    println!(
        "\nIteration {}: {} refined, {} unchanged, {} failed",
        report.iteration, report.refined, report.unchanged, report.failed
    );
    for row in &report.stats {
        println!(
            "  {:<60} {:>4} -> {:<4}",
            row.key, row.stats.original_count, row.stats.standardized_count
        );
    }
    print_warnings(&report.warnings);
}

fn print_mappings(session: &Session) {
    for (n, (identity, slot)) in session.mappings().iter().enumerate() {
        match slot.mapping() {
            Some(mapping) => {
                let stats = mapping.stats();
                println!(
                    "[{}] {} ({} -> {} values)",
                    n + 1,
                    identity,
                    stats.original_count,
                    stats.standardized_count
                );
                let queued = session.feedback_for(identity);
                for entry in mapping.entries() {
                    let marker = if queued.iter().any(|f| f.original == entry.original) {
                        "*"
                    } else {
                        " "
                    };
                    println!("   {marker} {} -> {}", entry.original, entry.canonical);
                }
            }
            None => println!("[{}] {} (failed)", n + 1, identity),
        }
    }
}

fn print_export(report: &ExportReport, session: &Session) {
    println!("\n{}", "=".repeat(80));
    println!("STANDARDIZATION COMPLETE (iteration {})", session.iteration());
    println!("{}\n", "=".repeat(80));

    for (label, artifact) in [("Mappings", &report.mappings), ("Cleaned data", &report.cleaned)] {
        match &artifact.error {
            None => println!(
                "  {:<14} {} ({} sheet(s))",
                label,
                artifact.path.display(),
                artifact.sheets
            ),
            Some(error) => println!("  {:<14} FAILED: {}", label, error),
        }
    }

    let totals = SessionReport::from_session(session).totals();
    println!(
        "\n  {} values standardized to {} ({:.1}% reduction)",
        totals.original_count, totals.standardized_count, totals.reduction_percentage
    );
    println!("{}", "=".repeat(80));
    print_warnings(&report.warnings);
}
