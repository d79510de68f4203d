// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and hands each subcommand to its
// use case in Layer 2. Results are printed here and nowhere
// else.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{AlignArgs, Commands, PredictArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "eeg-kt",
    version,
    about = "Knowledge tracing with EEG features: align recordings, train, predict."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Align(args)   => run_align(args),
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_align(args: AlignArgs) -> Result<()> {
    use crate::application::align_use_case::AlignUseCase;

    let out   = args.out.clone();
    let stats = AlignUseCase::from_csv(args.into())?.execute()?;

    println!(
        "Aligned EEG to {}/{} tasks ({} epochs used). Saved to '{}'.",
        stats.matched_tasks,
        stats.tasks,
        stats.epochs_used,
        out.display()
    );
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let cfg = args.into_config()?;
    tracing::info!("Starting training on '{}'", cfg.data_path);
    let out_dir = cfg.out_dir.clone();
    let outcome = TrainUseCase::new(cfg).execute()?;

    match (outcome.best_valid_auc, outcome.best_epoch) {
        (Some(auc), Some(epoch)) => println!(
            "Training complete after {} epochs. Best validation AUC {:.4} at epoch {}.",
            outcome.epochs_run, auc, epoch
        ),
        _ => println!("Training complete after {} epochs (no validation score).", outcome.epochs_run),
    }
    println!("Checkpoint saved in '{}'.", out_dir);
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    let out     = args.out.clone();
    let outcome = PredictUseCase::new(args.into()).execute()?;

    println!("Scored {} attempts, written to '{}'.", outcome.predictions, out.display());
    if let Some(auc) = outcome.auc {
        println!("AUC: {auc:.4}");
    }
    if let Some(acc) = outcome.accuracy {
        println!("Accuracy: {:.1}%", acc * 100.0);
    }
    Ok(())
}
