//! Study-area statistics CLI
//!
//! Runs a preset or configured analysis against an imagery catalog.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aoi_stats::{build_runtime, init_rayon, run_pipeline, Catalog, Config, Preset};

#[derive(Parser)]
#[command(name = "aoi-stats")]
#[command(about = "Reduce thematic raster products over a study area", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Built-in analysis to run instead of a configuration file
    #[arg(short, long, global = true, value_enum)]
    preset: Option<Preset>,

    /// Override concurrency level
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Override the analysis year
    #[arg(long, global = true)]
    year: Option<i32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline
    Run {
        /// Imagery catalog (YAML or JSON)
        #[arg(long)]
        catalog: PathBuf,

        /// Write the JSON run report here
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Validate configuration
    Validate,

    /// Write a preset as a configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// List the built-in presets
    Presets,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Run { catalog, report } => {
            let mut config = load_config(&cli)?;
            if report.is_some() {
                config.output.report_path = report.clone();
            }
            run_command(config, catalog)?;
        }

        Commands::Validate => {
            let config = load_config(&cli)?;
            config.validate()?;
            println!("Configuration '{}' is valid", config.name);
        }

        Commands::GenerateConfig { output } => {
            let config = load_config(&cli)?;
            generate_config_command(&config, output)?;
        }

        Commands::Presets => {
            for preset in Preset::ALL {
                println!("{:<24} {}", preset.name(), preset.description());
            }
        }
    }

    Ok(())
}

/// Resolve the configuration from `--preset` or `--config` and apply overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match (&cli.preset, &cli.config) {
        (Some(preset), _) => preset.config(),
        (None, Some(path)) => Config::from_file(path)?,
        (None, None) => anyhow::bail!("Either --preset or --config is required"),
    };

    if let Some(c) = cli.concurrency {
        config.processing.concurrency = c;
    }
    if let Some(year) = cli.year {
        config.set_year(year)?;
    }

    Ok(config)
}

fn run_command(config: Config, catalog_path: &Path) -> Result<()> {
    config.validate()?;

    let catalog = Catalog::from_file(catalog_path)
        .with_context(|| format!("Failed to load catalog {}", catalog_path.display()))?;

    // Initialize Rayon
    init_rayon(config.processing.rayon_threads)?;

    // Build and run Tokio runtime
    let runtime = build_runtime(config.processing.worker_threads)?;
    runtime.block_on(async { run_pipeline(config, &catalog).await })?;

    Ok(())
}

fn generate_config_command(config: &Config, output: &Path) -> Result<()> {
    let yaml = format!(
        "# Study-area statistics configuration: {}\n#\n# `{{year}}` in layer names, chart titles and console text is replaced\n# by the analysis year at run time.\n\n{}",
        config.name,
        config.to_yaml()?
    );

    std::fs::write(output, yaml)?;
    println!("Generated configuration at: {}", output.display());

    Ok(())
}
