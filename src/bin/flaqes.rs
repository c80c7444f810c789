//! flaqes CLI
//!
//! Analyzes a schema snapshot and prints roles, patterns and design tensions,
//! or renders the schema as a Mermaid ER diagram.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use flaqes::config::{CriticConfig, OutputFormat};
use flaqes::introspection::{IntrospectionConfig, IntrospectionResult, IntrospectorRegistry};
use flaqes::report::{mermaid_erd, render_markdown};
use flaqes::{Analyzer, Intent};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flaqes")]
#[command(about = "Critique a relational schema: roles, patterns and design tensions")]
struct Cli {
    /// Config file, on top of flaqes.toml / .flaqes.toml / config/flaqes.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the analysis pipeline
    Analyze {
        /// Schema snapshot (defaults to introspection.source from config)
        snapshot: Option<PathBuf>,

        /// Introspection dialect
        #[arg(short, long)]
        dialect: Option<String>,

        /// Intent preset: balanced, oltp, analytics, audit_heavy
        #[arg(short, long)]
        intent: Option<String>,

        /// Priority override, e.g. --weight auditability=0.9
        #[arg(short, long = "weight", value_parser = parse_weight)]
        weights: Vec<(String, f64)>,

        /// Only analyze these schemas
        #[arg(long = "schema")]
        schemas: Vec<String>,

        #[arg(short, long, value_enum)]
        format: Option<Format>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a Mermaid ER diagram
    Erd {
        snapshot: Option<PathBuf>,

        #[arg(short, long)]
        dialect: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List registered introspection dialects
    Dialects,

    /// Write the effective configuration as TOML
    Init {
        #[arg(default_value = "flaqes.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn parse_weight(arg: &str) -> Result<(String, f64), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected priority=weight, got '{}'", arg))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid weight '{}': {}", value, e))?;
    Ok((key.trim().to_string(), value))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn introspect(
    registry: &IntrospectorRegistry,
    config: &CriticConfig,
    snapshot: Option<PathBuf>,
    dialect: Option<String>,
    schemas: Vec<String>,
) -> anyhow::Result<IntrospectionResult> {
    let section = &config.introspection;
    let dialect = dialect.unwrap_or_else(|| section.dialect.clone());
    let source = snapshot
        .or_else(|| section.source.clone())
        .context("no snapshot given and introspection.source is not configured")?;

    let introspector = registry.create(&dialect)?;
    let introspection = IntrospectionConfig {
        source: Some(source.clone()),
        include_schemas: if schemas.is_empty() {
            section.include_schemas.clone()
        } else {
            schemas
        },
        exclude_schemas: section.exclude_schemas.clone(),
    };

    introspector
        .introspect(&introspection)
        .with_context(|| format!("failed to introspect {}", source.display()))
}

fn emit(output: Option<PathBuf>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = CriticConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    let registry = IntrospectorRegistry::with_defaults();

    match cli.command {
        Commands::Analyze {
            snapshot,
            dialect,
            intent,
            weights,
            schemas,
            format,
            output,
        } => {
            let result = introspect(&registry, &config, snapshot, dialect, schemas)?;

            // Precedence: CLI, then snapshot, then config
            let explicit_intent = intent.is_some() || !weights.is_empty();
            if let Some(preset) = intent {
                config.intent.preset = preset;
            }
            config.intent.weights.extend(weights);
            let mut analysis_config = config.analysis_config()?;
            if let (false, Some(stored)) = (explicit_intent, result.intent) {
                analysis_config = analysis_config.with_intent(stored);
            }

            let analysis = Analyzer::new(analysis_config)?.analyze(&result.graph);
            let format = match format {
                Some(Format::Json) => OutputFormat::Json,
                Some(Format::Text) => OutputFormat::Text,
                None => config.output.format,
            };
            let content = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&analysis)?,
                OutputFormat::Text => render_markdown(&result.graph, &analysis),
            };
            emit(output, &content)?;

            if analysis.diagnostics.has_errors() {
                eprintln!("{} rule(s) failed; results may be incomplete", analysis.diagnostics.errors().count());
            }
        }

        Commands::Erd {
            snapshot,
            dialect,
            output,
        } => {
            let result = introspect(&registry, &config, snapshot, dialect, Vec::new())?;
            emit(output, &mermaid_erd(&result.graph))?;
        }

        Commands::Dialects => {
            for dialect in registry.dialects() {
                println!("{}", dialect);
            }
            println!("\nIntent presets: {}", Intent::PRESETS.join(", "));
        }

        Commands::Init { path, force } => {
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            config.analysis_config().context("refusing to write an invalid configuration")?;
            config
                .save(&path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
    }

    Ok(())
}
