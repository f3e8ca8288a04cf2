//! Pocscan CLI: screen, signals, inspect and universe commands.
//!
//! Commands:
//! - `screen`: run every configured screen over a universe and write artifacts
//! - `signals`: weekly key reversal and RSI divergence scans over a universe
//! - `inspect`: unfiltered POC, trend and drawdown diagnostics for one symbol
//! - `universe list`: print the groups and symbols of a universe
//! - `universe init`: write the built-in universe as TOML

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pocscan_core::data::{
    BarProvider, CircuitBreaker, CsvProvider, SyntheticProvider, Universe, YahooProvider,
};
use pocscan_core::domain::Instrument;
use pocscan_runner::{
    BatchResult, CsvSink, DivergenceRecord, InspectReport, JsonSink, KeyReversalRecord,
    ResultSink, ScreenConfig, ScreenSpec, Screener, SignalBatch, SignalTable,
};

#[derive(Parser)]
#[command(
    name = "pocscan",
    about = "Pocscan: point-of-control and SuperTrend market screener"
)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    Yahoo,
    Csv,
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SignalKind {
    KeyReversal,
    Divergence,
    Both,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to a TOML screening config. Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Screen override as <lookback>:<threshold_pct> (repeatable), e.g. 5y:5.
    #[arg(long = "screen")]
    screens: Vec<ScreenSpec>,

    /// Data provider.
    #[arg(long, value_enum, default_value_t = ProviderKind::Yahoo)]
    provider: ProviderKind,

    /// Directory of <SYMBOL>_<interval>.csv files (csv provider).
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Worker threads. Defaults to the config value or available parallelism.
    #[arg(long)]
    workers: Option<usize>,

    /// ATR period override.
    #[arg(long)]
    atr_period: Option<usize>,

    /// ATR band multiplier override.
    #[arg(long)]
    multiplier: Option<f64>,

    /// Volume-profile edge count override.
    #[arg(long)]
    bin_count: Option<usize>,

    /// Screening date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    as_of: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every screen over a universe and write result artifacts.
    Screen {
        #[command(flatten)]
        run: RunArgs,

        /// Universe TOML. Defaults to the built-in market list.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Restrict to these universe groups (repeatable).
        #[arg(long = "group")]
        groups: Vec<String>,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        out_dir: PathBuf,

        /// Artifact format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
    },
    /// Scan weekly bars for key reversals and RSI divergences.
    Signals {
        #[command(flatten)]
        run: RunArgs,

        /// Which scan to run.
        #[arg(long, value_enum, default_value_t = SignalKind::Both)]
        kind: SignalKind,

        /// Universe TOML. Defaults to the built-in market list.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Restrict to these universe groups (repeatable).
        #[arg(long = "group")]
        groups: Vec<String>,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        out_dir: PathBuf,

        /// Artifact format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
    },
    /// Unfiltered diagnostics for a single symbol across every screen.
    Inspect {
        /// Symbol to inspect (e.g., SPY).
        symbol: String,

        #[command(flatten)]
        run: RunArgs,

        /// Print the report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Universe commands.
    Universe {
        #[command(subcommand)]
        action: UniverseAction,
    },
}

#[derive(Subcommand)]
enum UniverseAction {
    /// Print groups and symbols.
    List {
        /// Universe TOML. Defaults to the built-in market list.
        #[arg(long)]
        universe: Option<PathBuf>,
    },
    /// Write the built-in universe to a TOML file.
    Init {
        /// Destination path.
        #[arg(default_value = "universe.toml")]
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Screen {
            run,
            universe,
            groups,
            out_dir,
            format,
        } => run_screen(&run, universe.as_deref(), &groups, &out_dir, format),
        Commands::Signals {
            run,
            kind,
            universe,
            groups,
            out_dir,
            format,
        } => run_signals(&run, kind, universe.as_deref(), &groups, &out_dir, format),
        Commands::Inspect { symbol, run, json } => run_inspect(&symbol, &run, json),
        Commands::Universe { action } => match action {
            UniverseAction::List { universe } => run_universe_list(universe.as_deref()),
            UniverseAction::Init { path, force } => run_universe_init(&path, force),
        },
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(run: &RunArgs) -> Result<ScreenConfig> {
    let mut config = match &run.config {
        Some(path) => ScreenConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ScreenConfig::default(),
    };
    if !run.screens.is_empty() {
        config.screens = run.screens.clone();
    }
    if let Some(workers) = run.workers {
        config.workers = Some(workers);
    }
    if let Some(period) = run.atr_period {
        config.engine.atr_period = period;
    }
    if let Some(multiplier) = run.multiplier {
        config.engine.multiplier = multiplier;
    }
    if let Some(bins) = run.bin_count {
        config.engine.bin_count = bins;
    }
    config.validate().context("invalid screening config")?;
    Ok(config)
}

fn parse_as_of(as_of: Option<&str>) -> Result<NaiveDateTime> {
    let date = match as_of {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --as-of date '{s}' (expected YYYY-MM-DD)"))?,
        None => chrono::Local::now().date_naive(),
    };
    date.and_hms_opt(0, 0, 0)
        .context("as-of date has no midnight")
}

fn build_provider(run: &RunArgs) -> Result<Arc<dyn BarProvider>> {
    let provider: Arc<dyn BarProvider> = match run.provider {
        ProviderKind::Yahoo => {
            let breaker = Arc::new(CircuitBreaker::default_provider());
            Arc::new(YahooProvider::new(breaker).context("building Yahoo Finance client")?)
        }
        ProviderKind::Csv => {
            if !run.data_dir.is_dir() {
                bail!("data directory does not exist: {}", run.data_dir.display());
            }
            Arc::new(CsvProvider::new(&run.data_dir))
        }
        ProviderKind::Synthetic => Arc::new(SyntheticProvider::new()),
    };
    Ok(provider)
}

fn build_screener(run: &RunArgs) -> Result<Screener> {
    let config = load_config(run)?;
    let as_of = parse_as_of(run.as_of.as_deref())?;
    let provider = build_provider(run)?;
    Screener::new(provider, config, as_of).context("building screener")
}

fn load_universe(path: Option<&Path>) -> Result<Universe> {
    match path {
        Some(path) => Universe::from_file(path)
            .with_context(|| format!("loading universe {}", path.display())),
        None => Ok(Universe::default_markets()),
    }
}

fn select_instruments(universe_path: Option<&Path>, groups: &[String]) -> Result<Vec<Instrument>> {
    let mut universe = load_universe(universe_path)?;
    if !groups.is_empty() {
        universe = universe.select_groups(groups);
    }
    let instruments = universe.instruments();
    if instruments.is_empty() {
        bail!("no instruments selected (groups: {})", groups.join(", "));
    }
    Ok(instruments)
}

fn build_sinks(out_dir: &Path, format: OutputFormat) -> Vec<Box<dyn ResultSink>> {
    let mut sinks: Vec<Box<dyn ResultSink>> = Vec::new();
    if matches!(format, OutputFormat::Csv | OutputFormat::Both) {
        sinks.push(Box::new(CsvSink::new(out_dir)));
    }
    if matches!(format, OutputFormat::Json | OutputFormat::Both) {
        sinks.push(Box::new(JsonSink::new(out_dir)));
    }
    sinks
}

fn run_screen(
    run: &RunArgs,
    universe_path: Option<&Path>,
    groups: &[String],
    out_dir: &Path,
    format: OutputFormat,
) -> Result<()> {
    let instruments = select_instruments(universe_path, groups)?;
    let screener = build_screener(run)?;
    info!(
        instruments = instruments.len(),
        screens = screener.config().screens.len(),
        as_of = %screener.as_of().date(),
        "screening"
    );

    let sinks = build_sinks(out_dir, format);
    for batch in screener.run_all(&instruments) {
        print_batch(&batch);
        for sink in &sinks {
            let path = sink
                .write(&batch)
                .with_context(|| format!("writing results for screen {}", batch.screen))?;
            println!("Saved: {}", path.display());
        }
    }

    Ok(())
}

fn run_signals(
    run: &RunArgs,
    kind: SignalKind,
    universe_path: Option<&Path>,
    groups: &[String],
    out_dir: &Path,
    format: OutputFormat,
) -> Result<()> {
    let instruments = select_instruments(universe_path, groups)?;
    let screener = build_screener(run)?;
    info!(
        instruments = instruments.len(),
        kind = ?kind,
        as_of = %screener.as_of().date(),
        "scanning signals"
    );

    let mut tables = Vec::new();
    if matches!(kind, SignalKind::KeyReversal | SignalKind::Both) {
        let batch = screener.scan_key_reversals(&instruments);
        print_key_reversals(&batch);
        tables.push(SignalTable::from_batch(&batch)?);
    }
    if matches!(kind, SignalKind::Divergence | SignalKind::Both) {
        let batch = screener.scan_divergences(&instruments);
        print_divergences(&batch);
        tables.push(SignalTable::from_batch(&batch)?);
    }

    let sinks = build_sinks(out_dir, format);
    for table in &tables {
        for sink in &sinks {
            let path = sink
                .write_signals(table)
                .with_context(|| format!("writing {}", table.name))?;
            println!("Saved: {}", path.display());
        }
    }
    Ok(())
}

fn run_inspect(symbol: &str, run: &RunArgs, json: bool) -> Result<()> {
    let screener = build_screener(run)?;
    let universe = Universe::default_markets();
    let instrument = universe
        .instruments()
        .into_iter()
        .find(|i| i.symbol.eq_ignore_ascii_case(symbol))
        .unwrap_or_else(|| Instrument::new(symbol.to_uppercase(), "Other"));

    let report = screener.inspect(&instrument);
    if json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn run_universe_list(path: Option<&Path>) -> Result<()> {
    let universe = load_universe(path)?;
    for (group, symbols) in &universe.groups {
        println!("{group} ({})", symbols.len());
        println!("  {}", symbols.join(" "));
    }
    println!();
    println!(
        "{} group(s), {} unique symbol(s)",
        universe.groups.len(),
        universe.instruments().len()
    );
    Ok(())
}

fn run_universe_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (pass --force to overwrite)", path.display());
    }
    let toml = Universe::default_markets()
        .to_toml()
        .context("serializing default universe")?;
    std::fs::write(path, toml).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote default universe to {}", path.display());
    Ok(())
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into())
}

fn print_batch(batch: &BatchResult) {
    println!();
    println!(
        "=== Screen {} (as of {}) ===",
        batch.screen,
        batch.as_of.date()
    );
    println!(
        "Qualified: {}  Filtered: {}  Failed: {}",
        batch.records.len(),
        batch.filtered.len(),
        batch.failures.len()
    );
    if batch.records.is_empty() {
        println!("No instruments within {}% of their POC.", batch.screen.threshold_pct);
        return;
    }

    let trend_header: Vec<String> = batch
        .trend_intervals
        .iter()
        .map(|i| format!("{:>9}", format!("ST {i}")))
        .collect();
    println!(
        "{:<8} {:>10} {:>10} {:>8} {:>8} {}",
        "Symbol",
        "POC",
        "Price",
        "Dist%",
        "DD%",
        trend_header.join(" ")
    );
    println!("{}", "-".repeat(48 + 10 * batch.trend_intervals.len()));
    for r in &batch.records {
        let trends: Vec<String> = r
            .trends
            .iter()
            .map(|t| format!("{:>9}", fmt_opt(t.delta_pct)))
            .collect();
        println!(
            "{:<8} {:>10.2} {:>10.2} {:>8.2} {:>8.2} {}",
            r.symbol,
            r.poc,
            r.current_price,
            r.distance_pct,
            r.current_drawdown_pct,
            trends.join(" ")
        );
    }
    for failure in &batch.failures {
        println!("FAILED: {failure}");
    }
}

fn print_key_reversals(batch: &SignalBatch<KeyReversalRecord>) {
    println!();
    println!("=== Key reversals (as of {}) ===", batch.as_of.date());
    if batch.records.is_empty() {
        println!("No key reversals in the recent window.");
    } else {
        println!("{:<8} {:<10} {:<8} {:>10} {:>6}", "Symbol", "Date", "Signal", "Close", "RSI");
        println!("{}", "-".repeat(46));
        for r in &batch.records {
            println!(
                "{:<8} {:<10} {:<8} {:>10.2} {:>6.1}",
                r.symbol,
                r.date.to_string(),
                r.bias.as_str(),
                r.close,
                r.rsi
            );
        }
    }
    for failure in &batch.failures {
        println!("FAILED: {failure}");
    }
}

fn print_divergences(batch: &SignalBatch<DivergenceRecord>) {
    println!();
    println!("=== RSI divergences (as of {}) ===", batch.as_of.date());
    if batch.records.is_empty() {
        println!("No recent divergences.");
    } else {
        println!(
            "{:<8} {:<8} {:<10} {:>10} {:>6} {:<10} {:>10} {:>6}",
            "Symbol", "Mode", "Date1", "Price1", "RSI1", "Date2", "Price2", "RSI2"
        );
        println!("{}", "-".repeat(76));
        for r in &batch.records {
            println!(
                "{:<8} {:<8} {:<10} {:>10.2} {:>6.1} {:<10} {:>10.2} {:>6.1}",
                r.symbol,
                r.bias.as_str(),
                r.date1.to_string(),
                r.price1,
                r.rsi1,
                r.date2.to_string(),
                r.price2,
                r.rsi2
            );
        }
    }
    for failure in &batch.failures {
        println!("FAILED: {failure}");
    }
}

fn print_report(report: &InspectReport) {
    println!();
    println!("=== {} ({}) ===", report.instrument.symbol, report.instrument.membership());
    match &report.current_price {
        Ok(price) => println!("Price:          {price:.2}"),
        Err(e) => println!("Price:          unavailable ({e})"),
    }
    println!();
    println!("--- Screens ---");
    for check in &report.screens {
        let verdict = if check.passed { "PASS" } else { "fail" };
        match &check.poc {
            Ok(poc) => println!(
                "{:<10} POC {:>10.2}  distance {:>8}%  {verdict}",
                check.screen.to_string(),
                poc,
                fmt_opt(check.distance_pct)
            ),
            Err(e) => println!("{:<10} unavailable ({e})", check.screen.to_string()),
        }
    }
    println!();
    println!("--- SuperTrend ---");
    for t in &report.trends {
        match t.direction {
            Some(direction) => println!(
                "{:<5} {:?} at {} ({}%)",
                t.interval.code(),
                direction,
                fmt_opt(t.trend_value),
                fmt_opt(t.delta_pct)
            ),
            None => println!("{:<5} unavailable", t.interval.code()),
        }
    }
    println!();
    println!("--- Drawdown ---");
    match &report.drawdown {
        Ok(dd) => {
            println!("All-time high:  {:.2}", dd.all_time_high);
            println!("Max drawdown:   {:.2}%", dd.max_drawdown_pct);
            println!("Avg drawdown:   {:.2}%", dd.avg_drawdown_pct);
            println!("Current:        {:.2}%", dd.current_drawdown_pct);
        }
        Err(e) => println!("unavailable ({e})"),
    }
    println!();
}

fn report_json(report: &InspectReport) -> serde_json::Value {
    let err = |e: &dyn std::fmt::Display| serde_json::json!({ "error": e.to_string() });
    serde_json::json!({
        "symbol": report.instrument.symbol,
        "groups": report.instrument.membership(),
        "current_price": match &report.current_price {
            Ok(p) => serde_json::json!(p),
            Err(e) => err(e),
        },
        "screens": report.screens.iter().map(|c| serde_json::json!({
            "screen": c.screen.to_string(),
            "poc": match &c.poc {
                Ok(p) => serde_json::json!(p),
                Err(e) => err(e),
            },
            "distance_pct": c.distance_pct,
            "passed": c.passed,
        })).collect::<Vec<_>>(),
        "trends": report.trends,
        "drawdown": match &report.drawdown {
            Ok(dd) => serde_json::json!(dd),
            Err(e) => err(e),
        },
    })
}
