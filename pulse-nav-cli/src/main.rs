//! pulse-nav - replay navigation scenarios through the screen span trackers
//!
//! Drives the in-memory navigation container with a scripted scenario and
//! reports the screen_load, screen_session and screen_interactive spans it
//! produced.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use pulse_nav_core::telemetry::{RecordedSpan, SpanFormat, SpanRecorder, SpanWriter};
use pulse_nav_core::PulseConfig;

mod scenario;

use scenario::{Scenario, ScenarioRunner, StepReport};

/// Trace modules for lifecycle tracing
#[derive(Debug, Clone, ValueEnum)]
enum TraceModule {
    Load,
    Session,
    Interactive,
    Integration,
    All,
}

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// How replay results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Text,
}

#[derive(Parser, Debug)]
#[clap(
    name = "pulse-nav",
    about = "Replay navigation scenarios through the screen span trackers",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Enable lifecycle tracing (comma-separated: load,session,interactive,integration,all)
    #[clap(long, value_delimiter = ',', global = true)]
    trace: Vec<TraceModule>,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,
}

#[derive(Parser, Debug)]
enum Command {
    /// Replay a scenario file and report the recorded spans
    Replay {
        /// Scenario file (YAML or JSON)
        scenario: PathBuf,

        /// Configuration file, overriding the scenario's own `config`
        #[clap(long)]
        config: Option<PathBuf>,

        /// Output format
        #[clap(long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Also write the spans to this directory (`.jsonl`, or `.txt` with --format text)
        #[clap(long)]
        output: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Configuration file to load (defaults apply when omitted)
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

fn initialize_tracing(log_level: &LogLevel, trace_modules: &[TraceModule]) {
    let mut filter = EnvFilter::new(log_level.to_filter_directive());

    for module in trace_modules {
        let directive = match module {
            TraceModule::Load => "pulse_nav_core::navigation::screen_load=trace",
            TraceModule::Session => "pulse_nav_core::navigation::screen_session=trace",
            TraceModule::Interactive => "pulse_nav_core::navigation::screen_interactive=trace",
            TraceModule::Integration => "pulse_nav_core::navigation::integration=trace",
            TraceModule::All => "pulse_nav_core=trace",
        };

        if let Ok(parsed) = directive.parse() {
            filter = filter.add_directive(parsed);
        }
    }

    // Logs go to stderr; stdout carries the report
    if !trace_modules.is_empty() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();

        tracing::info!(trace_modules = ?trace_modules, "Lifecycle tracing enabled");
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, &cli.trace);

    match cli.command {
        Command::Replay {
            scenario,
            config,
            format,
            output,
        } => replay_command(&scenario, config.as_deref(), format, output.as_deref()),
        Command::Config { config } => config_command(config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<Option<PulseConfig>> {
    path.map(PulseConfig::load).transpose()
}

fn replay_command(
    scenario_path: &Path,
    config_path: Option<&Path>,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let scenario = Scenario::load(scenario_path)?;
    let config = match load_config(config_path)? {
        Some(config) => config,
        None => scenario.config.clone().unwrap_or_default(),
    };
    debug!(?config, "Effective configuration");

    let mut runner = ScenarioRunner::new(&config);
    runner.run(&scenario)?;
    let recorder = runner.recorder();

    match format {
        OutputFormat::Table => print_table(recorder, runner.reports()),
        OutputFormat::Json => print_json(recorder, runner.reports())?,
        OutputFormat::Text => print!("{}", SpanWriter::format_human_readable(recorder)),
    }

    if let Some(dir) = output {
        let span_format = match format {
            OutputFormat::Text => SpanFormat::Text,
            OutputFormat::Table | OutputFormat::Json => SpanFormat::Json,
        };
        let path = SpanWriter::write(recorder, span_format, dir)?;
        info!("Spans written to {}", path.display());
        eprintln!("Spans written to {}", path.display());
    }

    Ok(())
}

fn config_command(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?.unwrap_or_default();
    let yaml = serde_yaml_ng::to_string(&config).context("Failed to serialize configuration")?;
    print!("{yaml}");
    if !config.navigation_enabled() {
        eprintln!("Note: navigation instrumentation is disabled by this configuration");
    }
    Ok(())
}

// Table row structure for span display
#[derive(Tabled)]
struct SpanTableRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Type")]
    pulse_type: String,
    #[tabled(rename = "Screen")]
    screen: String,
    #[tabled(rename = "Route Key")]
    route_key: String,
    #[tabled(rename = "Seen")]
    seen: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Duration (ms)")]
    duration_ms: u64,
}

impl SpanTableRow {
    fn from_span(index: usize, span: &RecordedSpan) -> Self {
        let screen = match (
            span.attribute_str("screen.name"),
            span.attribute_str("last.screen.name"),
        ) {
            (Some(screen), Some(last)) => format!("{last} -> {screen}"),
            (Some(screen), None) => screen.to_string(),
            (None, _) => "-".to_string(),
        };
        Self {
            index,
            pulse_type: span.pulse_type().unwrap_or(span.name.as_str()).to_string(),
            screen,
            route_key: span.attribute_str("routeKey").unwrap_or("-").to_string(),
            seen: span
                .attribute_bool("routeHasBeenSeen")
                .map(|b| b.to_string())
                .unwrap_or_else(|| "-".to_string()),
            outcome: format!("{:?}", span.outcome).to_lowercase(),
            duration_ms: span.duration_ms(),
        }
    }
}

fn print_table(recorder: &SpanRecorder, reports: &[StepReport]) {
    let spans = recorder.spans();
    if spans.is_empty() {
        println!("No spans recorded.");
    } else {
        let rows: Vec<SpanTableRow> = spans
            .iter()
            .enumerate()
            .map(|(i, span)| SpanTableRow::from_span(i + 1, span))
            .collect();
        let table = Table::new(&rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()))
            .to_string();

        println!(
            "Recorded {} spans ({} exported, {} discarded, {} open)\n",
            spans.len(),
            recorder.exported().len(),
            recorder.discarded().len(),
            recorder.open().len()
        );
        println!("{table}");
    }

    for report in reports {
        if let Some(outcome) = &report.content_ready {
            println!("step {} content_ready: {:?}", report.index, outcome);
        }
    }
}

fn print_json(recorder: &SpanRecorder, reports: &[StepReport]) -> Result<()> {
    let output = serde_json::json!({
        "run_id": recorder.run_id(),
        "spans": recorder.spans(),
        "steps": reports,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
