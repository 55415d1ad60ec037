//! # Analyze one asset from an observation file
//! term-analytics analyze --input data/observations.parquet --asset BTC
//!
//! # Analyze every asset, full precision, to a file
//! term-analytics analyze --input data/observations.parquet \
//!     --full-precision --output results/analysis.json
//!
//! # List assets present in a file
//! term-analytics assets --input data/observations.parquet

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use term_analytics::analytics::{analyze, analyze_by_asset, AnalysisReport, Precision};
use term_analytics::data::DataLoader;

#[derive(Parser)]
#[command(name = "term-analytics")]
#[command(about = "Futures term-structure analytics engine")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis over an observation file
    Analyze {
        /// Path to a parquet or CSV observation file
        #[arg(short, long)]
        input: PathBuf,

        /// Restrict to a single asset symbol
        #[arg(short, long)]
        asset: Option<String>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Emit unrounded values instead of 2-decimal display rounding
        #[arg(long)]
        full_precision: bool,
    },

    /// List distinct assets in an observation file
    Assets {
        /// Path to a parquet or CSV observation file
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            asset,
            output,
            full_precision,
        } => {
            let loader = DataLoader::new(&input);
            let precision = if full_precision {
                Precision::Full
            } else {
                Precision::Display
            };

            let report = match asset {
                Some(symbol) => {
                    let observations = loader
                        .load_asset(&symbol)
                        .with_context(|| format!("loading {} from {}", symbol, input.display()))?;
                    let analysis = analyze(&observations);
                    serde_json::to_value(AnalysisReport::new(&analysis, precision))?
                }
                None => {
                    let observations = loader
                        .load()
                        .with_context(|| format!("loading {}", input.display()))?;
                    let reports: serde_json::Map<String, serde_json::Value> =
                        analyze_by_asset(&observations)
                            .iter()
                            .map(|(symbol, analysis)| {
                                Ok((
                                    symbol.clone(),
                                    serde_json::to_value(AnalysisReport::new(
                                        analysis, precision,
                                    ))?,
                                ))
                            })
                            .collect::<Result<_>>()?;
                    serde_json::Value::Object(reports)
                }
            };

            let rendered = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    fs::write(&path, rendered)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Wrote {}", path.display());
                }
                None => println!("{}", rendered),
            }
        }
        Commands::Assets { input } => {
            let loader = DataLoader::new(&input);
            let assets = loader
                .assets()
                .with_context(|| format!("reading {}", input.display()))?;
            for asset in assets {
                println!("{}", asset);
            }
        }
    }

    Ok(())
}
