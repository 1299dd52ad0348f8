//! Sleep Flux CLI - Command-line interface for Sleep Flux
//!
//! Commands:
//! - generate: Write a synthetic sleep table to CSV
//! - transform: Clean and engineer a CSV table
//! - analyze: Produce a report envelope for a CSV file or SQLite query
//! - assess: Score one night's metrics against the risk heuristics
//! - run: Config-driven generate, transform and analyze

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use sleep_flux::config::PipelineConfig;
use sleep_flux::loader::{export_csv, CsvSource, SqliteSource, TableSource};
use sleep_flux::normalizer::DEFAULT_NORMALIZE_COLUMNS;
use sleep_flux::report::weekday_name;
use sleep_flux::risk::{AssessmentHistory, RiskAssessment, RiskInputs};
use sleep_flux::{
    generate_table, Column, FluxError, NegativeValuePolicy, SleepPipeline, Transformer,
    FLUX_VERSION,
};

/// Sleep Flux - batch ETL and analysis for daily sleep-health records
#[derive(Parser)]
#[command(name = "sleepflux")]
#[command(version = FLUX_VERSION)]
#[command(about = "Generate, transform and analyze sleep-health tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a synthetic sleep table to CSV
    Generate {
        /// Number of rows
        #[arg(short = 'n', long, default_value = "1000")]
        samples: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Clean a CSV table and derive features
    Transform {
        /// Input CSV path
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Treatment of negative values
        #[arg(long, default_value = "drop-row")]
        negative_values: PolicyArg,

        /// Normalize columns after feature engineering
        #[arg(long)]
        normalize: bool,

        /// Columns to normalize (comma separated; defaults to the core metrics)
        #[arg(long, value_delimiter = ',', value_parser = parse_column, requires = "normalize")]
        columns: Vec<Column>,

        /// Write the quality report as JSON to this path
        #[arg(long)]
        quality: Option<PathBuf>,
    },

    /// Analyze a table and print the report envelope
    Analyze {
        /// Input CSV path
        #[arg(short, long, conflicts_with = "database")]
        input: Option<PathBuf>,

        /// SQLite database path
        #[arg(long, requires = "query")]
        database: Option<String>,

        /// SQL query selecting observation columns
        #[arg(long)]
        query: Option<String>,

        /// Pipeline config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Anomaly z-score threshold
        #[arg(long)]
        threshold: Option<f64>,

        /// Trend moving-average window
        #[arg(long)]
        window: Option<usize>,

        /// Output path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score one night's sleep against the risk heuristics
    Assess {
        #[arg(long)]
        sleep_duration: f64,

        #[arg(long)]
        quality_score: f64,

        #[arg(long)]
        deep_sleep_pct: f64,

        #[arg(long)]
        rem_sleep_pct: f64,

        #[arg(long)]
        age: f64,

        #[arg(long)]
        stress_level: f64,

        #[arg(long)]
        heart_rate: f64,

        /// Append the result to a JSON history file
        #[arg(long)]
        history: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate, transform and analyze using a config file
    Run {
        /// Pipeline config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the configured row count
        #[arg(short = 'n', long)]
        samples: Option<usize>,

        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,

        /// Write the transformed table to this CSV path
        #[arg(long)]
        export: Option<PathBuf>,

        /// Output path for the report (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Drop any row holding a negative value
    DropRow,
    /// Replace negative values with missing cells
    MaskValue,
    /// Leave negative values in place
    Keep,
}

impl From<PolicyArg> for NegativeValuePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::DropRow => NegativeValuePolicy::DropRow,
            PolicyArg::MaskValue => NegativeValuePolicy::MaskValue,
            PolicyArg::Keep => NegativeValuePolicy::Keep,
        }
    }
}

fn parse_column(raw: &str) -> Result<Column, String> {
    raw.parse()
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

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

fn run(cli: Cli) -> Result<(), FluxCliError> {
    match cli.command {
        Commands::Generate {
            samples,
            seed,
            output,
        } => cmd_generate(samples, seed, &output),

        Commands::Transform {
            input,
            output,
            negative_values,
            normalize,
            columns,
            quality,
        } => cmd_transform(
            &input,
            &output,
            negative_values.into(),
            normalize.then_some(columns),
            quality.as_deref(),
        ),

        Commands::Analyze {
            input,
            database,
            query,
            config,
            threshold,
            window,
            output,
        } => {
            let source: Box<dyn TableSource> = match (input, database, query) {
                (Some(path), _, _) => Box::new(CsvSource::new(path)),
                (None, Some(database), Some(query)) => Box::new(SqliteSource::new(database, query)),
                _ => return Err(FluxCliError::NoSource),
            };
            let mut config = load_config(config.as_deref())?;
            if let Some(threshold) = threshold {
                config.anomaly_threshold = threshold;
            }
            if let Some(window) = window {
                config.trend_window = window;
            }
            cmd_analyze(source.as_ref(), config, output.as_deref())
        }

        Commands::Assess {
            sleep_duration,
            quality_score,
            deep_sleep_pct,
            rem_sleep_pct,
            age,
            stress_level,
            heart_rate,
            history,
            json,
        } => {
            let inputs = RiskInputs {
                sleep_duration,
                quality_score,
                deep_sleep_pct,
                rem_sleep_pct,
                age,
                stress_level,
                heart_rate,
            };
            cmd_assess(&inputs, history.as_deref(), json)
        }

        Commands::Run {
            config,
            samples,
            seed,
            export,
            output,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(samples) = samples {
                config.samples = samples;
            }
            if let Some(seed) = seed {
                config.seed = seed;
            }
            cmd_run(config, export.as_deref(), output.as_deref())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, FluxCliError> {
    match path {
        Some(path) => Ok(PipelineConfig::load(path)?),
        None => Ok(PipelineConfig::default()),
    }
}

fn cmd_generate(samples: usize, seed: u64, output: &Path) -> Result<(), FluxCliError> {
    let table = generate_table(samples, seed)?;
    export_csv(&table, output).map_err(FluxError::from)?;
    Ok(())
}

fn cmd_transform(
    input: &Path,
    output: &Path,
    policy: NegativeValuePolicy,
    normalize: Option<Vec<Column>>,
    quality: Option<&Path>,
) -> Result<(), FluxCliError> {
    let table = CsvSource::new(input).load().map_err(FluxError::from)?;

    let mut transformer = Transformer::new().clean_with(policy).engineer_features();
    if let Some(columns) = normalize {
        let columns = if columns.is_empty() {
            DEFAULT_NORMALIZE_COLUMNS.to_vec()
        } else {
            columns
        };
        transformer = transformer.normalize(Some(columns));
    }
    let result = transformer.quality_checks().run(table)?;

    export_csv(&result.table, output).map_err(FluxError::from)?;
    if let (Some(path), Some(report)) = (quality, &result.quality_report) {
        fs::write(path, serde_json::to_string_pretty(report)?)?;
        info!("Wrote quality report to {}", path.display());
    }
    Ok(())
}

fn cmd_analyze(
    source: &dyn TableSource,
    config: PipelineConfig,
    output: Option<&Path>,
) -> Result<(), FluxCliError> {
    let pipeline = SleepPipeline::new(config)?;
    let result = pipeline.run_source(source)?;
    let json = pipeline.encoder().encode_to_json(&result)?;
    write_output(output, &json)
}

fn cmd_assess(inputs: &RiskInputs, history: Option<&Path>, json: bool) -> Result<(), FluxCliError> {
    let assessment = RiskAssessment::assess(inputs);

    if let Some(path) = history {
        let mut log: AssessmentHistory = if path.exists() {
            serde_json::from_str(&fs::read_to_string(path)?)?
        } else {
            AssessmentHistory::new()
        };
        log.record(chrono::Utc::now().date_naive(), &assessment);
        fs::write(path, serde_json::to_string_pretty(&log)?)?;
        info!("History now holds {} entries", log.len());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
        return Ok(());
    }

    println!("Health Risk Score: {}/100", assessment.risk_score);
    println!("Sleep Quality: {:.0}/100", inputs.quality_score);
    println!(
        "Life Expectancy Impact: {:.1} years",
        assessment.life_expectancy_impact
    );
    println!(
        "Sleep Stages: deep {:.0}%, REM {:.0}%, light {:.0}%",
        inputs.deep_sleep_pct,
        inputs.rem_sleep_pct,
        inputs.light_sleep_pct()
    );

    println!();
    println!("Potential Health Conditions:");
    if assessment.conditions.is_empty() {
        println!("  No significant health risks detected");
    }
    for condition in &assessment.conditions {
        println!("  - {}", condition.label());
    }

    println!();
    println!("Recommendations:");
    for recommendation in &assessment.recommendations {
        println!("  - {}", recommendation.message());
    }
    Ok(())
}

fn cmd_run(
    config: PipelineConfig,
    export: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), FluxCliError> {
    let pipeline = SleepPipeline::new(config)?;
    let result = pipeline.run_generated()?;

    if let Some(path) = export {
        export_csv(&result.table, path).map_err(FluxError::from)?;
    }

    let insights = &result.report.insights;
    if let (Some(best), Some(worst)) = (insights.best_sleep_day, insights.worst_sleep_day) {
        info!(
            "Best sleep on {}, worst on {}",
            weekday_name(best),
            weekday_name(worst)
        );
    }

    let json = pipeline.encoder().encode_to_json(&result)?;
    write_output(output, &json)
}

fn write_output(path: Option<&Path>, content: &str) -> Result<(), FluxCliError> {
    match path {
        Some(path) => {
            fs::write(path, content)?;
            info!("Wrote report to {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

// Error types

#[derive(Debug)]
enum FluxCliError {
    Io(io::Error),
    Flux(FluxError),
    Json(serde_json::Error),
    NoSource,
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
                    FluxError::Load(_) => ("LOAD_ERROR", "Check the input path or query"),
                    FluxError::Schema(_) => (
                        "SCHEMA_ERROR",
                        "Check the input columns and engineer features before use",
                    ),
                    FluxError::Analysis(_) => (
                        "ANALYSIS_ERROR",
                        "The table is too small, has no spread or holds non-finite values",
                    ),
                    FluxError::InvalidSampleCount(_)
                    | FluxError::Config(_)
                    | FluxError::Distribution(_) => {
                        ("CONFIG_ERROR", "Review the config file and flags")
                    }
                    FluxError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                    FluxError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
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
            FluxCliError::NoSource => CliError {
                code: "NO_SOURCE".to_string(),
                message: "No input given".to_string(),
                hint: Some("Pass --input, or --database with --query".to_string()),
            },
        }
    }
}
