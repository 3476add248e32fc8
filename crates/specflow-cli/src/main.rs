use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use log::debug;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use specflow_core::analyze::{self, OptimizationStrategy, SpecMetrics};
use specflow_core::config::{self, CONFIG_FILE_NAME, SpecflowConfig};
use specflow_core::detect;
use specflow_core::parse;
use specflow_core::process::{ProgressEvent, ProgressReporter};
use specflow_core::transform;
use specflow_core::{RawSpecDocument, SpecFormat, UnifiedSpec};

#[derive(Parser)]
#[command(
    name = "specflow",
    about = "Ingest, analyze and normalize API descriptions",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse an API description and print a summary
    Parse {
        /// Path to the API description (YAML or JSON); defaults to the configured input
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Input format, detected when omitted
        #[arg(long)]
        format: Option<FormatArg>,
    },

    /// Measure an API description and show the processing strategy
    Analyze {
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(long)]
        format: Option<FormatArg>,

        /// Output format
        #[arg(long, default_value = "yaml")]
        output: OutputFormat,
    },

    /// Detect authentication and pagination patterns
    Detect {
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(long)]
        format: Option<FormatArg>,

        #[arg(long, default_value = "yaml")]
        output: OutputFormat,
    },

    /// Run the full pipeline and print the normalized result
    Process {
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(long)]
        format: Option<FormatArg>,

        /// What to print
        #[arg(long, default_value = "unified")]
        emit: EmitKind,

        #[arg(long, default_value = "yaml")]
        output: OutputFormat,
    },

    /// Initialize a new specflow configuration
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Openapi,
    Asyncapi,
    Postman,
    Graphql,
}

impl From<FormatArg> for SpecFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Openapi => SpecFormat::OpenApi,
            FormatArg::Asyncapi => SpecFormat::AsyncApi,
            FormatArg::Postman => SpecFormat::Postman,
            FormatArg::Graphql => SpecFormat::GraphQl,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmitKind {
    /// The normalized unified model
    Unified,
    /// A canonical OpenAPI 3.0 document
    Openapi,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { input, format } => cmd_parse(input, format),

        Commands::Analyze {
            input,
            format,
            output,
        } => cmd_analyze(input, format, output),

        Commands::Detect {
            input,
            format,
            output,
        } => cmd_detect(input, format, output),

        Commands::Process {
            input,
            format,
            emit,
            output,
        } => cmd_process(input, format, emit, output).await,

        Commands::Init { force } => cmd_init(force),

        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            clap_complete::generate(shell, &mut cmd, "specflow", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Load the project config file from the current directory, or defaults.
fn load_project_config() -> Result<SpecflowConfig> {
    let config_path = PathBuf::from(CONFIG_FILE_NAME);
    Ok(config::load_config(&config_path)?.unwrap_or_default())
}

/// Read the input file into a document, applying the CLI or configured format.
fn read_document(
    input: Option<PathBuf>,
    format: Option<FormatArg>,
    cfg: &SpecflowConfig,
) -> Result<RawSpecDocument> {
    let path = input.unwrap_or_else(|| PathBuf::from(&cfg.input));
    let content =
        fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
    debug!("read {} bytes from {}", content.len(), path.display());
    let document = RawSpecDocument::new(content);
    Ok(match format.map(SpecFormat::from).or(cfg.format) {
        Some(format) => document.with_format(format),
        None => document,
    })
}

fn load_spec(input: Option<PathBuf>, format: Option<FormatArg>, cfg: &SpecflowConfig) -> Result<UnifiedSpec> {
    let document = read_document(input, format, cfg)?;
    Ok(parse::parse_document(document)?)
}

fn print_output<T: Serialize>(value: &T, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Yaml => {
            let yaml = serde_yaml_ng::to_string(value)?;
            print!("{}", yaml);
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{}", json);
        }
    }
    Ok(())
}

fn cmd_parse(input: Option<PathBuf>, format: Option<FormatArg>) -> Result<()> {
    let cfg = load_project_config()?;
    let spec = load_spec(input, format, &cfg)?;

    eprintln!("Valid {} description: {}", spec.format, spec.title);
    eprintln!("  Version: {}", spec.version);
    eprintln!("  Paths: {}", spec.path_count());
    eprintln!("  Endpoints: {}", spec.endpoints.len());
    eprintln!("  Schemas: {}", spec.schemas.len());
    eprintln!("  Security schemes: {}", spec.security_schemes.len());
    Ok(())
}

#[derive(Serialize)]
struct AnalyzeSummary {
    metrics: SpecMetrics,
    strategy: OptimizationStrategy,
    enabled: Vec<&'static str>,
}

fn cmd_analyze(input: Option<PathBuf>, format: Option<FormatArg>, output: OutputFormat) -> Result<()> {
    let cfg = load_project_config()?;
    let spec = load_spec(input, format, &cfg)?;
    let metrics = analyze::analyze(&spec);
    let strategy = analyze::select(&metrics);
    let summary = AnalyzeSummary {
        enabled: strategy.enabled(),
        metrics,
        strategy,
    };
    print_output(&summary, output)
}

fn cmd_detect(input: Option<PathBuf>, format: Option<FormatArg>, output: OutputFormat) -> Result<()> {
    let cfg = load_project_config()?;
    let spec = load_spec(input, format, &cfg)?;
    let report = detect::detect_patterns(&spec, &cfg.detection.extra_auth_keywords);
    print_output(&report, output)
}

async fn cmd_process(
    input: Option<PathBuf>,
    format: Option<FormatArg>,
    emit: EmitKind,
    output: OutputFormat,
) -> Result<()> {
    let cfg = load_project_config()?;
    let document = read_document(input, format, &cfg)?;

    let (sink, mut events) = mpsc::unbounded_channel::<ProgressEvent>();
    let progress = ProgressReporter::new(sink);
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            eprintln!("  [{:>3}%] {}", event.percent, event.stage.as_str());
        }
    });

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("  cancelling...");
                cancel.cancel();
            }
        })
    };

    let result = specflow_core::ingest(document, &cfg, &progress, &cancel).await;
    interrupt.abort();
    // Closing the sink lets the printer drain and exit
    drop(progress);
    let _ = printer.await;
    let outcome = result.context("processing failed")?;

    let stats = &outcome.processed.stats;
    eprintln!(
        "Processed {} items as {} ({} tier, {} chunks, {} batches, {} cache hits)",
        stats.items,
        stats.mode.as_str(),
        outcome.metrics.complexity_tier,
        stats.chunks,
        stats.batches,
        stats.cache_hits
    );
    if let Some(dedup) = &stats.dedup {
        eprintln!("  Merged {} duplicate schemas", dedup.removed());
    }

    match emit {
        EmitKind::Unified => print_output(&outcome.processed.spec, output),
        EmitKind::Openapi => print_output(&transform::to_openapi(&outcome.processed.spec), output),
    }
}

fn cmd_init(force: bool) -> Result<()> {
    write_default_config(Path::new(CONFIG_FILE_NAME), force)?;
    eprintln!("Created {}", CONFIG_FILE_NAME);
    Ok(())
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists. Use --force to overwrite.", path.display());
    }
    fs::write(path, config::default_config_content())
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
