use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gemstone_learning::{
    ArtifactPaths, CustomData, DataIngestion, PipelineConfig, PipelineTelemetry, PredictPipeline,
    TrainingPipeline,
};
use serde_json::json;
use shared_logging::{JsonLogger, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "gem", version, about = "Gemstone price training and prediction")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reads the dataset and writes the train/test split.
    Ingest {
        #[arg(long, default_value = "config/pipeline.toml")]
        config: PathBuf,
    },
    /// Runs ingestion, preprocessing, evaluation and persistence.
    Train {
        #[arg(long, default_value = "config/pipeline.toml")]
        config: PathBuf,
    },
    /// Predicts the price of one gemstone.
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
struct PredictArgs {
    #[arg(long, default_value = "artifacts")]
    artifacts: PathBuf,
    #[arg(long)]
    carat: f64,
    #[arg(long)]
    depth: f64,
    #[arg(long)]
    table: f64,
    #[arg(long)]
    x: f64,
    #[arg(long)]
    y: f64,
    #[arg(long)]
    z: f64,
    #[arg(long)]
    cut: String,
    #[arg(long)]
    color: String,
    #[arg(long)]
    clarity: String,
}

impl PredictArgs {
    /// Clap accepts `NaN` and `inf` as floats, so the record is validated
    /// here the same way form input is.
    fn record(&self) -> Result<CustomData> {
        let record = CustomData {
            carat: self.carat,
            depth: self.depth,
            table: self.table,
            x: self.x,
            y: self.y,
            z: self.z,
            cut: self.cut.clone(),
            color: self.color.clone(),
            clarity: self.clarity.clone(),
        };
        record.validate().context("invalid gemstone attributes")?;
        Ok(record)
    }
}

/// Presentation rounding for a predicted price.
fn format_price(price: f64) -> String {
    format!("{price:.2}")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest { config } => handle_ingest(&config),
        Commands::Train { config } => handle_train(&config),
        Commands::Predict(args) => handle_predict(&args),
    }
}

fn load_config(path: &Path) -> Result<(PipelineConfig, Arc<JsonLogger>)> {
    let config =
        PipelineConfig::load(path).with_context(|| format!("loading config {}", path.display()))?;
    let logger = JsonLogger::for_run(&config.logging.dir)?;
    Ok((config, Arc::new(logger)))
}

fn handle_ingest(path: &Path) -> Result<()> {
    let (config, logger) = load_config(path)?;
    let telemetry = PipelineTelemetry::new(logger, "ingestion");
    let output = DataIngestion::new(config.ingestion)
        .run(Some(&telemetry))
        .context("ingestion failed")?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn handle_train(path: &Path) -> Result<()> {
    let (config, logger) = load_config(path)?;
    let telemetry = PipelineTelemetry::new(Arc::clone(&logger), "trainer");
    match TrainingPipeline.run(&config, Some(&telemetry)) {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(err) => {
            logger.emit(
                "gem",
                LogLevel::Error,
                "training failed",
                json!({ "error": err.to_string() }),
            )?;
            Err(err).context("training failed")
        }
    }
}

fn handle_predict(args: &PredictArgs) -> Result<()> {
    println!("{}", predict_price(args)?);
    Ok(())
}

fn predict_price(args: &PredictArgs) -> Result<String> {
    let record = args.record()?;
    let pipeline = PredictPipeline::new(ArtifactPaths::in_dir(&args.artifacts));
    let price = pipeline.predict(&record).context("prediction failed")?;
    Ok(format_price(price))
}
