pub mod annotate;
pub mod classify;
pub mod config;
pub mod data;
pub mod server;
pub mod types;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the source layers, classify, and write styled GeoJSON + legend
    Annotate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the point-query API and the annotated output
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Annotate { config } => annotate_command(config).await,
        Commands::Serve { config } => serve_command(config).await,
    }
}

async fn annotate_command(config_path: &Path) -> Result<()> {
    let app_config = config::AppConfig::load_from_file(config_path)?;
    let out_dir = &app_config.output.dir;
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {:?}", out_dir))?;

    // Each layer loads as its own task. Facility layers fail independently;
    // the demographic layer is the whole point, so its failure is fatal.
    let demographics = {
        let source = app_config.input.demographics.clone();
        tokio::spawn(async move { data::load_feature_collection(&source).await })
    };

    let facilities: Vec<_> = app_config
        .input
        .facilities
        .iter()
        .cloned()
        .map(|source| {
            let handle = {
                let source = source.clone();
                tokio::spawn(async move { data::load_feature_collection(&source).await })
            };
            (source, handle)
        })
        .collect();

    let demo_fc = demographics
        .await
        .context("Demographic load task panicked")??;
    tracing::info!("Loaded {} demographic features", demo_fc.features.len());

    let styled = annotate::annotate_demographics(&app_config, demo_fc);
    write_json(&out_dir.join("demographics.geojson"), &styled)?;

    for (i, (source, handle)) in facilities.into_iter().enumerate() {
        match handle.await.context("Facility load task panicked")? {
            Ok(fc) => {
                tracing::info!("Loaded {} facility features from {}", fc.features.len(), source);
                let styled = annotate::annotate_facilities(fc);
                write_json(&out_dir.join(format!("facilities_{}.geojson", i)), &styled)?;
            }
            Err(err) => {
                tracing::error!("Skipping facility layer {}: {:#}", source, err);
            }
        }
    }

    let legend = annotate::legend(&app_config.classification);
    write_json(&out_dir.join("legend.json"), &legend)?;

    tracing::info!("Annotation complete, output in {:?}", out_dir);
    Ok(())
}

async fn serve_command(config_path: &Path) -> Result<()> {
    let app_config = config::AppConfig::load_from_file(config_path)?;

    let fc = data::load_feature_collection(&app_config.input.demographics).await?;
    let areas = data::block_groups(&fc, &app_config);

    server::start_server(app_config, areas).await
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string(value).context("Failed to serialize output")?;
    fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}
