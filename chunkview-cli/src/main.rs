//! Chunkview CLI: drive a chart session from files or synthetic data.
//!
//! Commands:
//! - `view`: load an instrument, optionally select an event and replay brush
//!   drags, and emit every effect as one JSON line
//! - `synth`: write a deterministic synthetic series as JSON or CSV

mod logging;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use chunkview_core::config::ChunkviewConfig;
use chunkview_core::controller::{Effect, Trigger};
use chunkview_core::domain::{parse_date, ClosedOrder, TradeSet};
use chunkview_core::source::{CsvDirSource, JsonDirSource, SeriesSource, SyntheticSource};
use chunkview_core::window::Viewport;
use chunkview_core::ChartSession;
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "chunkview", about = "Chunkview CLI, chunked price-chart viewport controller")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceKind {
    Json,
    Csv,
    Synthetic,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an instrument and print the resulting render frames.
    View {
        /// Instrument symbol.
        #[arg(long)]
        symbol: String,

        /// Where the series comes from.
        #[arg(long, value_enum, default_value_t = SourceKind::Synthetic)]
        source: SourceKind,

        /// Directory holding <SYMBOL>.json or <SYMBOL>.csv. Defaults to ./data.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// JSON file with {"events": [...], "holdings": [...]}.
        #[arg(long)]
        trades: Option<PathBuf>,

        /// JSON file with an array of closed orders.
        #[arg(long)]
        closed_orders: Option<PathBuf>,

        /// Active indicators (e.g. SMA RSI).
        #[arg(long, num_args = 1..)]
        indicators: Vec<String>,

        /// Index of the event to center on.
        #[arg(long)]
        event: Option<usize>,

        /// Only show the run-up to the buy when centering on an event.
        #[arg(long, default_value_t = false)]
        test_mode: bool,

        /// Brush drags to replay after loading, as START:END (repeatable).
        #[arg(long = "drag", value_parser = parse_viewport)]
        drags: Vec<Viewport>,

        /// Write effects here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Seconds to wait for the series to load.
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Print a tooltip summary for this date (YYYY-MM-DD) after loading.
        #[arg(long)]
        describe: Option<String>,
    },
    /// Write a synthetic series for testing.
    Synth {
        /// Instrument symbol (seeds the random walk).
        #[arg(long)]
        symbol: String,

        /// Number of trading days.
        #[arg(long, default_value_t = 1500)]
        days: usize,

        /// First calendar date (YYYY-MM-DD).
        #[arg(long, default_value = "2015-01-01")]
        start: String,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Output directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(logging::LoggingConfig::from_env().with_verbosity(cli.verbose))?;

    match cli.command {
        Commands::View {
            symbol,
            source,
            data_dir,
            config,
            trades,
            closed_orders,
            indicators,
            event,
            test_mode,
            drags,
            output,
            timeout_secs,
            describe,
        } => run_view(ViewArgs {
            symbol,
            source,
            data_dir,
            config,
            trades,
            closed_orders,
            indicators,
            event,
            test_mode,
            drags,
            output,
            timeout: Duration::from_secs(timeout_secs),
            describe,
        }),
        Commands::Synth {
            symbol,
            days,
            start,
            format,
            out,
        } => run_synth(&symbol, days, &start, format, &out),
    }
}

struct ViewArgs {
    symbol: String,
    source: SourceKind,
    data_dir: PathBuf,
    config: Option<PathBuf>,
    trades: Option<PathBuf>,
    closed_orders: Option<PathBuf>,
    indicators: Vec<String>,
    event: Option<usize>,
    test_mode: bool,
    drags: Vec<Viewport>,
    output: Option<PathBuf>,
    timeout: Duration,
    describe: Option<String>,
}

fn run_view(args: ViewArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ChunkviewConfig::from_file(path)?,
        None => ChunkviewConfig::default(),
    };
    if args.test_mode {
        config.settings.test_mode = true;
    }

    let trades: TradeSet = match &args.trades {
        Some(path) => read_json(path)?,
        None => TradeSet::default(),
    };
    let closed_orders: Option<Vec<ClosedOrder>> = args
        .closed_orders
        .as_deref()
        .map(read_json::<Vec<ClosedOrder>>)
        .transpose()?;

    let source: Arc<dyn SeriesSource> = match args.source {
        SourceKind::Json => Arc::new(JsonDirSource::new(&args.data_dir)),
        SourceKind::Csv => Arc::new(CsvDirSource::new(&args.data_dir)),
        SourceKind::Synthetic => Arc::new(SyntheticSource::new(default_start()?, 1500)),
    };
    info!(source = source.name(), symbol = %args.symbol, "starting view");

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("create {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };

    let mut session = ChartSession::spawn(config, source).context("start fetch worker")?;

    // Selection before load is recorded and applied when the series arrives.
    emit(&mut out, &session.dispatch(Trigger::EventSelected { index: args.event }))?;
    if !args.indicators.is_empty() {
        emit(
            &mut out,
            &session.dispatch(Trigger::IndicatorsChanged {
                active: args.indicators.clone(),
            }),
        )?;
    }
    emit(
        &mut out,
        &session.dispatch(Trigger::InstrumentChanged {
            symbol: args.symbol.clone(),
            trades,
            closed_orders,
        }),
    )?;

    let loaded = session.wait_for_frame(args.timeout);
    check_loaded(
        &mut out,
        &args.symbol,
        &loaded,
        session.controller().is_loading(),
        args.timeout,
    )?;

    for viewport in args.drags {
        emit(&mut out, &session.dispatch(Trigger::ViewportDragged { viewport }))?;
    }

    if let Some(raw) = &args.describe {
        let date = parse_date(raw).with_context(|| format!("invalid --describe date '{raw}'"))?;
        match session.controller().describe(date) {
            Some(summary) => writeln!(out, "{}", serde_json::to_string(&summary)?)?,
            None => bail!("{date} is not in the loaded series"),
        }
    }

    out.flush()?;
    session.shutdown();
    Ok(())
}

fn run_synth(symbol: &str, days: usize, start: &str, format: OutputFormat, out: &Path) -> Result<()> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d")?;
    std::fs::create_dir_all(out).with_context(|| format!("create {}", out.display()))?;
    let payload = SyntheticSource::new(start, days).generate(symbol);

    let path = match format {
        OutputFormat::Json => {
            let path = out.join(format!("{symbol}.json"));
            std::fs::write(&path, serde_json::to_string(&payload)?)
                .with_context(|| format!("write {}", path.display()))?;
            path
        }
        OutputFormat::Csv => CsvDirSource::new(out).write(symbol, &payload)?,
    };
    println!("Wrote {} bars to {}", payload.price.len(), path.display());
    Ok(())
}

/// Emit the load's effects, then fail if the series is unavailable or never
/// arrived. Output is flushed before either error.
fn check_loaded(
    out: &mut dyn Write,
    symbol: &str,
    loaded: &[Effect],
    still_loading: bool,
    timeout: Duration,
) -> Result<()> {
    emit(out, loaded)?;
    if let Some(Effect::Unavailable { message, .. }) = loaded.last() {
        out.flush()?;
        bail!("{symbol} unavailable: {message}");
    }
    if still_loading {
        out.flush()?;
        bail!("timed out after {timeout:?} waiting for {symbol}");
    }
    Ok(())
}

fn emit(out: &mut dyn Write, effects: &[Effect]) -> Result<()> {
    for effect in effects {
        writeln!(out, "{}", serde_json::to_string(effect)?)?;
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse {}", path.display()))
}

fn parse_viewport(raw: &str) -> Result<Viewport, String> {
    let (start, end) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected START:END, got '{raw}'"))?;
    let start: usize = start.trim().parse().map_err(|e| format!("bad start '{start}': {e}"))?;
    let end: usize = end.trim().parse().map_err(|e| format!("bad end '{end}': {e}"))?;
    if end < start {
        return Err(format!("end {end} precedes start {start}"));
    }
    Ok(Viewport::new(start, end))
}

fn default_start() -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(2015, 1, 1).context("invalid default start date")
}
