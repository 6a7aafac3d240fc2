//! Product Pricer CLI
//!
//! A command-line front end that loads configuration, builds the price
//! service once and runs predictions, training and model inspection.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{inspect, predict, train};
use pricer_lib::{PredictionRequest, PriceService, DEFAULT_CATEGORY};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Product Pricer CLI
#[derive(Parser)]
#[command(name = "pricer")]
#[command(author, version, about = "CLI for the Product Pricer", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Config file (defaults to ~/.config/pricer/config.toml when present)
    #[arg(long, short, global = true, env = "PRICER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Model directory, overriding the config file and PRICER_MODEL_DIR
    #[arg(long, global = true)]
    pub model_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Print Prometheus metrics to stderr after the command finishes
    #[arg(long, global = true)]
    pub dump_metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Predict a price for a product
    Predict {
        /// Product title
        #[arg(long)]
        title: String,

        /// Product description
        #[arg(long)]
        description: Option<String>,

        /// Product category
        #[arg(long, default_value = DEFAULT_CATEGORY)]
        category: String,

        /// Reference price, as a number or text such as "1,299.000 DT"
        #[arg(long)]
        price: Option<String>,
    },

    /// Retrain the model on labeled rows and persist it
    Train {
        /// JSON array or JSON lines file of labeled rows
        #[arg(long, short)]
        input: PathBuf,
    },

    /// Show the feature vector built for an input
    Features {
        /// Product category
        #[arg(long, default_value = DEFAULT_CATEGORY)]
        category: String,

        /// Reference price
        #[arg(long)]
        price: Option<String>,
    },

    /// Show the serving model and known categories
    Inspect,
}

fn init_tracing(verbose: bool, format: output::OutputFormat) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr so command output stays parseable
    let (json_layer, plain_layer) = match format {
        output::OutputFormat::Json => (Some(fmt::layer().json().with_writer(std::io::stderr)), None),
        output::OutputFormat::Table => (None, Some(fmt::layer().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(plain_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.format);

    let config = config::PricerConfig::load(cli.config.as_deref())?;
    let service_config = config.into_service_config(cli.model_dir.clone());
    info!(model_dir = %service_config.store.model_dir.display(), "Pricer configured");

    let service = Arc::new(PriceService::new(service_config));

    match cli.command {
        Commands::Predict {
            title,
            description,
            category,
            price,
        } => {
            let request = PredictionRequest {
                title,
                description,
                category,
                input_price: predict::parse_price_arg(price),
            };
            predict::predict(&service, &request, cli.format)?;
        }
        Commands::Train { input } => {
            train::train(&service, &input, cli.format).await?;
        }
        Commands::Features { category, price } => {
            predict::features(&service, &category, predict::parse_price_arg(price), cli.format)?;
        }
        Commands::Inspect => {
            inspect::inspect(&service, cli.format)?;
        }
    }

    if cli.dump_metrics {
        output::dump_metrics()?;
    }

    Ok(())
}
