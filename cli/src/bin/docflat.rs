use clap::{Parser, Subcommand};
use docflat_cli::{Manifest, segmenter_for};
use color_eyre::eyre::Result;
use docflat::config::InputConfig;
use docflat::{DocflatConfig, Pipeline, QualityReport, load_image};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Flatten a single document photo
    Process {
        /// Path to the input photo
        #[arg(short, long)]
        input: PathBuf,
        /// Path for the flattened image
        #[arg(short, long)]
        output: PathBuf,
        /// TOML or JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Precomputed segmentation mask
        #[arg(long, conflicts_with = "luminance")]
        mask: Option<PathBuf>,
        /// Segment by brightness: pixels above this level are document
        #[arg(long)]
        luminance: Option<u8>,
        /// Directory for intermediate images and the run report
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },
    /// Process every document listed in a manifest
    Batch {
        /// TOML or JSON manifest
        #[arg(short, long)]
        manifest: PathBuf,
    },
    /// Print resolution and sharpness information for an image
    Inspect {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Print the JSON schema of the configuration file
    Schema,
    /// Write the default configuration
    InitConfig {
        /// Destination, .toml or .json
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Process {
            input,
            output,
            config,
            mask,
            luminance,
            artifacts,
        } => {
            process_document(
                input,
                output,
                config.as_deref(),
                mask.as_deref(),
                *luminance,
                artifacts.clone(),
            )?;
        }
        Commands::Batch { manifest } => {
            let manifest = Manifest::from_file(manifest)?;
            manifest.run()?.into_result()?;
            info!("✅ Batch completed!");
        }
        Commands::Inspect { input } => {
            let image = load_image(input, &InputConfig::default())?;
            let report = QualityReport::measure(&image);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Schema => {
            let schema = DocflatConfig::schema();
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
        Commands::InitConfig { output } => {
            DocflatConfig::default().to_file(output)?;
            info!("📄 Default configuration saved to: {:?}", output);
        }
    }

    Ok(())
}

fn process_document(
    input: &Path,
    output: &Path,
    config_path: Option<&Path>,
    mask: Option<&Path>,
    luminance: Option<u8>,
    artifacts: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => DocflatConfig::from_file(path)?,
        None => DocflatConfig::default(),
    };
    if artifacts.is_some() {
        config.artifacts.dir = artifacts;
    }

    let pipeline = Pipeline::builder()
        .config(config)
        .segmenter(segmenter_for(mask, luminance))
        .build();
    info!("{}", pipeline.info());

    let report = pipeline.process_file(input, output)?;
    let summary = json!({
        "output": output,
        "output_size": report.output_size,
        "upscale_path": report.upscale_path,
        "soft_failures": report.soft_failures.len(),
    });
    info!("✅ Document flattened: {}", summary);
    Ok(())
}
