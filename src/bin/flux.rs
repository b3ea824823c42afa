//! Flux CLI - Command-line interface for Synheart Flux signals
//!
//! Commands:
//! - run: Process streaming records from stdin (streaming mode)
//! - transform: Process a file of records (batch mode)
//! - config: Print the default configuration of a processor

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use flux_signals::config::{PipelineConfig, ProcessorConfig, ProcessorKind};
use flux_signals::types::{ProcessorOutput, StreamRecord};
use flux_signals::{FluxError, SignalProcessor, FLUX_VERSION};
use tracing_subscriber::EnvFilter;

/// Flux - Adaptive streaming statistics for real-time control signals
#[derive(Parser)]
#[command(name = "flux")]
#[command(author = "Synheart AI Inc")]
#[command(version = FLUX_VERSION)]
#[command(about = "Scale, normalize and analyze streaming signals", long_about = None)]
struct Cli {
    /// Log debug events to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process streaming records from stdin (streaming mode)
    Run {
        #[command(flatten)]
        processor: ProcessorArgs,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Load processor state from file
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save processor state to file on exit
        #[arg(long)]
        save_state: Option<PathBuf>,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Process a file of records (batch mode)
    Transform {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        processor: ProcessorArgs,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Load processor state from file
        #[arg(long)]
        load_state: Option<PathBuf>,

        /// Save processor state to file after processing
        #[arg(long)]
        save_state: Option<PathBuf>,
    },

    /// Print the default configuration of a processor
    Config {
        /// Processor kind
        #[arg(value_enum)]
        kind: KindArg,
    },
}

#[derive(clap::Args)]
struct ProcessorArgs {
    /// Configuration file (JSON)
    #[arg(short, long, conflicts_with = "processor")]
    config: Option<PathBuf>,

    /// Processor with default parameters, when no configuration file is given
    #[arg(short, long, value_enum, default_value = "scaler")]
    processor: KindArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Scaler,
    Normalization,
    PeakDetection,
    RateOfChange,
    Smoother,
}

impl From<KindArg> for ProcessorKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Scaler => ProcessorKind::Scaler,
            KindArg::Normalization => ProcessorKind::Normalization,
            KindArg::PeakDetection => ProcessorKind::PeakDetection,
            KindArg::RateOfChange => ProcessorKind::RateOfChange,
            KindArg::Smoother => ProcessorKind::Smoother,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one output per line)
    Ndjson,
    /// JSON array of outputs
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), FluxCliError> {
    match cli.command {
        Commands::Run {
            processor,
            output_format,
            load_state,
            save_state,
            flush,
        } => cmd_run(
            &processor,
            output_format,
            load_state.as_deref(),
            save_state.as_deref(),
            flush,
        ),

        Commands::Transform {
            input,
            output,
            processor,
            input_format,
            output_format,
            load_state,
            save_state,
        } => cmd_transform(
            &input,
            &output,
            &processor,
            input_format,
            output_format,
            load_state.as_deref(),
            save_state.as_deref(),
        ),

        Commands::Config { kind } => cmd_config(kind.into()),
    }
}

fn cmd_run(
    args: &ProcessorArgs,
    output_format: OutputFormat,
    load_state: Option<&Path>,
    save_state: Option<&Path>,
    flush: bool,
) -> Result<(), FluxCliError> {
    let mut processor = build_processor(args, load_state)?;

    if atty::is(atty::Stream::Stdin) {
        tracing::warn!("reading records from an interactive terminal, end input with Ctrl-D");
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut outputs: Vec<ProcessorOutput> = Vec::new();

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record = parse_record(trimmed, index + 1)?;
        let output = processor.process_record(&record);

        match output_format {
            OutputFormat::Ndjson => {
                writeln!(stdout, "{}", serde_json::to_string(&output)?)?;
                if flush {
                    stdout.flush()?;
                }
            }
            // Array formats can only be written once the stream ends
            OutputFormat::Json | OutputFormat::JsonPretty => outputs.push(output),
        }
    }

    if !matches!(output_format, OutputFormat::Ndjson) {
        write!(stdout, "{}", format_output(&outputs, &output_format)?)?;
    }
    stdout.flush()?;

    if let Some(state_path) = save_state {
        fs::write(state_path, processor.save_state()?)?;
    }

    Ok(())
}

fn cmd_transform(
    input: &Path,
    output: &Path,
    args: &ProcessorArgs,
    input_format: InputFormat,
    output_format: OutputFormat,
    load_state: Option<&Path>,
    save_state: Option<&Path>,
) -> Result<(), FluxCliError> {
    // Read input
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let records = match input_format {
        InputFormat::Ndjson => parse_ndjson(&input_data)?,
        InputFormat::Json => serde_json::from_str::<Vec<StreamRecord>>(&input_data)?,
    };

    if records.is_empty() {
        return Err(FluxCliError::NoRecords);
    }

    let mut processor = build_processor(args, load_state)?;
    let outputs: Vec<ProcessorOutput> = records
        .iter()
        .map(|record| processor.process_record(record))
        .collect();

    tracing::debug!(records = records.len(), processor = %processor.kind(), "transform complete");

    if let Some(state_path) = save_state {
        fs::write(state_path, processor.save_state()?)?;
    }

    let output_data = format_output(&outputs, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_config(kind: ProcessorKind) -> Result<(), FluxCliError> {
    let config = PipelineConfig::new(ProcessorConfig::default_for(kind));
    println!("{}", config.to_json()?);
    Ok(())
}

// Helper functions

fn build_processor(
    args: &ProcessorArgs,
    load_state: Option<&Path>,
) -> Result<SignalProcessor, FluxCliError> {
    let mut processor = match &args.config {
        Some(path) => SignalProcessor::from_json(&fs::read_to_string(path)?)?,
        None => SignalProcessor::with_defaults(args.processor.into()),
    };

    if let Some(state_path) = load_state {
        processor.load_state(&fs::read_to_string(state_path)?)?;
    }

    Ok(processor)
}

fn parse_record(line: &str, line_number: usize) -> Result<StreamRecord, FluxCliError> {
    StreamRecord::from_json(line).map_err(|e| {
        FluxCliError::ParseError(format!("Failed to parse record on line {}: {}", line_number, e))
    })
}

fn parse_ndjson(data: &str) -> Result<Vec<StreamRecord>, FluxCliError> {
    data.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| parse_record(line.trim(), index + 1))
        .collect()
}

fn format_output(
    outputs: &[ProcessorOutput],
    format: &OutputFormat,
) -> Result<String, FluxCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for output in outputs {
                lines.push(serde_json::to_string(output)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(outputs)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(outputs)?),
    }
}

// Error types

#[derive(Debug)]
enum FluxCliError {
    Io(io::Error),
    Flux(FluxError),
    Json(serde_json::Error),
    NoRecords,
    ParseError(String),
}

impl From<io::Error> for FluxCliError {
    fn from(e: io::Error) -> Self {
        FluxCliError::Io(e)
    }
}

impl From<FluxError> for FluxCliError {
    fn from(e: FluxError) -> Self {
        FluxCliError::Flux(e)
    }
}

impl From<serde_json::Error> for FluxCliError {
    fn from(e: serde_json::Error) -> Self {
        FluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FluxCliError> for CliError {
    fn from(e: FluxCliError) -> Self {
        match e {
            FluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FluxCliError::Flux(e) => {
                let (code, hint) = match &e {
                    FluxError::JsonError(_) => ("CONFIG_ERROR", "Check JSON syntax"),
                    FluxError::InvalidParameter { .. } => {
                        ("INVALID_PARAMETER", "Run 'flux config <processor>' for valid defaults")
                    }
                    FluxError::UnknownProcessor(_) => (
                        "UNKNOWN_PROCESSOR",
                        "Use scaler, normalization, peak_detection, rate_of_change or smoother",
                    ),
                    FluxError::InvalidRecord(_) => ("INVALID_RECORD", "Check record fields"),
                    FluxError::StateMismatch { .. } => (
                        "STATE_MISMATCH",
                        "Load state saved by a processor of the same kind",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            FluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FluxCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            FluxCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Each record looks like {\"value\": 0.5, \"dt\": 0.01}".to_string()),
            },
        }
    }
}
