use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use libriphone::phoneme::cli::{Cli, Command};
use libriphone::phoneme::{self, PredictionSummary, TrainingSummary};

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = cli
        .command
        .args()
        .to_config()
        .context("Failed to build pipeline configuration")?
        .with_resolved_data_root()
        .context("Failed to locate corpus")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    match cli.command {
        Command::Train(_) => {
            let summary = phoneme::train(&config).context("Training failed")?;
            print_training(&summary);
        }
        Command::Predict(_) => {
            let summary = phoneme::predict(&config).context("Prediction failed")?;
            print_prediction(&summary);
        }
        Command::Run(_) => {
            let (training, prediction) =
                phoneme::run_pipeline(&config).context("Pipeline failed")?;
            print_training(&training);
            print_prediction(&prediction);
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_training(summary: &TrainingSummary) {
    println!("Trained {} epochs", summary.epochs.len());
    if let Some(accuracy) = summary.best_validation_accuracy {
        println!("Best validation accuracy: {:.6}", accuracy);
    }
    println!("Checkpoint: {:?}", summary.checkpoint);
}

fn print_prediction(summary: &PredictionSummary) {
    println!("Wrote {} predictions to {:?}", summary.frames, summary.output);
}
