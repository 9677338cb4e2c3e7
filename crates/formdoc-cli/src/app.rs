//! CLI Application logic
//!
//! Contains the command-line interface implementation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

use formdoc_core::config::ReportConfig;
use formdoc_core::diagnostics::Diagnostic;
use formdoc_core::{debug_condition, ConditionDebug, Diagnostics, ReportRegistry};
use formdoc_ooxml::{render_report, EngineSettings, RenderOptions};

use crate::metadata::{MetadataStore, ReportMetadata};

/// Settings file looked up in the report directory when `--settings` is
/// not given
pub const SETTINGS_FILE: &str = "formdoc.toml";

/// Output format for diagnostics and listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for tool consumption
    Json,
}

#[derive(Parser)]
#[command(name = "formdoc")]
#[command(author, version, about = "Conditional Word report assembly", long_about = None)]
struct Cli {
    /// Metadata file recording generated reports
    #[arg(long, global = true, default_value = "metadata/metadata.json")]
    metadata_file: PathBuf,

    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a report from its answers
    Render {
        /// Report directory holding manifest.yaml
        report_dir: PathBuf,

        /// Answers file (JSON or YAML)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory the document is written to
        #[arg(short, long, default_value = "outputs")]
        output_dir: PathBuf,

        /// Output file name (defaults to `{report id}_{timestamp}`)
        #[arg(short, long)]
        name: Option<String>,

        /// Engine settings (TOML)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Do not record the render in the metadata file
        #[arg(long)]
        no_metadata: bool,

        /// Reuse the answers of a recorded render
        #[arg(long, conflicts_with = "input")]
        from_record: Option<String>,

        /// Description stored with the metadata record
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Load and validate a report configuration
    Check {
        /// Report directory holding manifest.yaml
        report_dir: PathBuf,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Evaluate a condition expression
    Eval {
        /// Expression, e.g. "tipo_opinion == 'favorable'"
        expression: String,

        /// Variables (JSON or YAML)
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Print the full evaluation trace as JSON
        #[arg(long)]
        debug: bool,
    },

    /// List recorded renders
    Reports {
        /// Only records of this report id
        #[arg(short, long)]
        report: Option<String>,

        /// Delete the record with this id instead of listing
        #[arg(long)]
        delete: Option<String>,

        /// Output format (text or json)
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Everything the render command needs
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub report_dir: PathBuf,
    pub input: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub name: Option<String>,
    pub settings: Option<PathBuf>,
    pub record_metadata: bool,
    pub from_record: Option<String>,
    pub description: Option<String>,
    pub metadata_file: PathBuf,
}

impl RenderRequest {
    pub fn new(report_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
            input: None,
            output_dir: output_dir.into(),
            name: None,
            settings: None,
            record_metadata: true,
            from_record: None,
            description: None,
            metadata_file: PathBuf::from("metadata/metadata.json"),
        }
    }
}

/// Run the CLI application
///
/// This is the main entry point for the command-line interface.
/// It parses arguments and dispatches to the appropriate command.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Render {
            report_dir,
            input,
            output_dir,
            name,
            settings,
            no_metadata,
            from_record,
            description,
        } => {
            let request = RenderRequest {
                report_dir,
                input,
                output_dir,
                name,
                settings,
                record_metadata: !no_metadata,
                from_record,
                description,
                metadata_file: cli.metadata_file,
            };
            render_command(&request)?;
        }
        Commands::Check { report_dir, format } => {
            if !check_command(&report_dir, format)? {
                std::process::exit(1);
            }
        }
        Commands::Eval {
            expression,
            context,
            debug,
        } => {
            eval_command(&expression, context.as_deref(), debug)?;
        }
        Commands::Reports {
            report,
            delete,
            format,
        } => {
            let store = MetadataStore::new(cli.metadata_file);
            match delete {
                Some(id) => {
                    if !store.delete(&id)? {
                        anyhow::bail!("Metadata record not found: {}", id);
                    }
                    println!("Deleted: {}", id);
                }
                None => reports_command(&store, report.as_deref(), format)?,
            }
        }
    }

    Ok(())
}

/// Install the stderr subscriber; `RUST_LOG` wins over `verbose`
pub fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    // A second call (tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// ============================================================================
// Render
// ============================================================================

/// Execute the render command
///
/// Returns the path of the written document.
pub fn render_command(request: &RenderRequest) -> Result<PathBuf> {
    println!("formdoc v{}", formdoc_core::VERSION);
    println!("Rendering: {}", request.report_dir.display());

    let diagnostics = Diagnostics::tracing();
    let config = ReportConfig::load(&request.report_dir, &diagnostics).with_context(|| {
        format!(
            "Failed to load report configuration: {}",
            request.report_dir.display()
        )
    })?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration for report '{}'", config.manifest.id))?;

    let store = MetadataStore::new(&request.metadata_file);
    let inputs = match (&request.from_record, &request.input) {
        (Some(id), _) => {
            let record = store
                .by_id(id)?
                .with_context(|| format!("Metadata record not found: {}", id))?;
            if record.report_id != config.manifest.id {
                anyhow::bail!(
                    "Record {} belongs to report '{}', not '{}'",
                    id,
                    record.report_id,
                    config.manifest.id
                );
            }
            println!("  Answers from record: {}", id);
            record.input_data
        }
        (None, Some(path)) => {
            println!("  Answers: {}", path.display());
            load_variables(path)?
        }
        (None, None) => anyhow::bail!("No answers given: use --input <file> or --from-record <id>"),
    };

    let context = ReportRegistry::with_builtins()
        .build_context(&inputs, &config, &diagnostics)
        .with_context(|| format!("Failed to build context for '{}'", config.manifest.id))?;
    let settings = load_settings(request.settings.as_deref(), &config.report_dir)?;

    let name = request.name.clone().unwrap_or_else(|| {
        format!(
            "{}_{}",
            config.manifest.id,
            Local::now().format("%Y%m%d_%H%M%S")
        )
    });
    let template = config.template_path();
    println!("  Template: {}", template.display());

    let options = RenderOptions::new(&request.output_dir).with_settings(settings);
    let output = render_report(&template, &context, &name, &options, &diagnostics)
        .with_context(|| format!("Failed to render report: {}", template.display()))?;

    if request.record_metadata {
        let mut record = ReportMetadata::new(
            &config.manifest.id,
            &config.manifest.nombre,
            &config.manifest.version,
            inputs,
            &output,
        );
        if let Some(description) = &request.description {
            record = record.with_description(description);
        }
        println!("  Metadata: {}", record.id);
        store.append(record)?;
    }

    println!();
    println!("Render complete!");
    println!("  Output: {}", output.display());

    Ok(output)
}

/// Read a JSON or YAML file holding a mapping of variables
pub fn load_variables(path: &Path) -> Result<formdoc_core::Context> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let value: Value = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON: {}", path.display()))?
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML: {}", path.display()))?
    };
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(formdoc_core::Context::new()),
        _ => anyhow::bail!("Expected a mapping of variables in {}", path.display()),
    }
}

/// Engine settings from `explicit`, else from the report's `formdoc.toml`,
/// else the defaults
pub fn load_settings(explicit: Option<&Path>, report_dir: &Path) -> Result<EngineSettings> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = report_dir.join(SETTINGS_FILE);
            if !candidate.is_file() {
                return Ok(EngineSettings::default());
            }
            candidate
        }
    };
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read settings: {}", path.display()))?;
    EngineSettings::from_toml_str(&content)
        .with_context(|| format!("Invalid settings: {}", path.display()))
}

// ============================================================================
// Check
// ============================================================================

/// Execute the check command
///
/// Returns `false` when the configuration cannot be used to render.
pub fn check_command(report_dir: &Path, format: OutputFormat) -> Result<bool> {
    let (diagnostics, sink) = Diagnostics::collecting();

    let mut problems: Vec<Diagnostic> = Vec::new();
    let manifest_id = match ReportConfig::load(report_dir, &diagnostics) {
        Ok(config) => {
            if let Err(err) = config.validate() {
                problems.push(Diagnostic::error(err.to_string()));
            }
            Some(config.manifest.id)
        }
        Err(err) => {
            problems.push(Diagnostic::error(err.to_string()));
            None
        }
    };

    let mut reported: Vec<Diagnostic> = sink
        .take()
        .into_iter()
        .filter(|d| d.is_warning() || d.is_error())
        .collect();
    reported.extend(problems);
    let valid = !reported.iter().any(Diagnostic::is_error);

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "report": manifest_id,
                "valid": valid,
                "diagnostics": reported,
            });
            let json =
                serde_json::to_string_pretty(&json).context("Failed to serialize diagnostics")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            if reported.is_empty() {
                println!("✓ No issues found in {}", report_dir.display());
            } else {
                for diag in &reported {
                    println!("{}", diag);
                    println!();
                }
                let errors = reported.iter().filter(|d| d.is_error()).count();
                let warnings = reported.iter().filter(|d| d.is_warning()).count();
                println!("Found {} error(s) and {} warning(s)", errors, warnings);
            }
        }
    }

    Ok(valid)
}

// ============================================================================
// Eval
// ============================================================================

/// Execute the eval command
pub fn eval_command(
    expression: &str,
    context: Option<&Path>,
    debug: bool,
) -> Result<ConditionDebug> {
    let variables = match context {
        Some(path) => load_variables(path)?,
        None => formdoc_core::Context::new(),
    };

    let (diagnostics, sink) = Diagnostics::collecting();
    let trace = debug_condition(expression, &variables, &diagnostics);

    if debug {
        let json = serde_json::to_string_pretty(&trace).context("Failed to serialize trace")?;
        println!("{}", json);
    } else {
        println!("{}", trace.result);
        for diag in sink.take().iter().filter(|d| d.is_warning() || d.is_error()) {
            eprintln!("{}", diag);
        }
    }

    Ok(trace)
}

// ============================================================================
// Reports
// ============================================================================

/// Execute the reports command
pub fn reports_command(
    store: &MetadataStore,
    report_id: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let records = match report_id {
        Some(id) => store.by_report_id(id)?,
        None => store.load_all()?,
    };

    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(&records).context("Failed to serialize records")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No reports recorded in {}", store.path().display());
            }
            for record in &records {
                println!("{}  {}", record.id, record.summary());
                println!("    {}", record.output_path);
            }
        }
    }

    Ok(())
}
