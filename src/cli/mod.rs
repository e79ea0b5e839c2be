// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Four commands are supported:
//   1. `prepare-data` — writes the sample requirements document
//   2. `init-model`   — builds the tokenizer and caches the base model
//   3. `train`        — SPIN fine-tuning with LoRA adapters
//   4. `extract`      — document → generated requirements markdown
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, ExtractArgs, InitModelArgs, PrepareDataArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "reqforge",
    version = "0.1.0",
    about = "Fine-tune a causal LM with self-play LoRA training, then extract requirements from documents."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    /// This keeps the CLI layer thin — it only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::PrepareData(args) => run_prepare_data(args),
            Commands::InitModel(args)   => run_init_model(args),
            Commands::Train(args)       => run_train(args),
            Commands::Extract(args)     => run_extract(args),
        }
    }
}

fn run_prepare_data(args: PrepareDataArgs) -> Result<()> {
    use crate::application::prepare_use_case::PrepareDataUseCase;

    let path = PrepareDataUseCase::new(args.data_dir).execute()?;
    println!("Sample data written to {}", path.display());
    Ok(())
}

fn run_init_model(args: InitModelArgs) -> Result<()> {
    use crate::application::prepare_use_case::InitModelUseCase;

    let cache = args.model_cache.clone();
    let info  = InitModelUseCase::new(args.into()).execute()?;
    println!(
        "Base model saved to {} ({} parameters, vocab {})",
        cache.display(), info.total_params, info.vocab_size
    );
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on documents in: {}", args.data_dir.display());

    // Convert CLI args → application config (separates presentation from domain)
    let use_case = TrainUseCase::new(args.into());
    let report   = use_case.execute()?;

    println!(
        "Training complete. Best eval loss {:.4}, checkpoint in {}",
        report.best_eval_loss,
        use_case.config().output_dir.display()
    );
    Ok(())
}

fn run_extract(args: ExtractArgs) -> Result<()> {
    use crate::application::extract_use_case::ExtractUseCase;

    let use_case = ExtractUseCase::new(args.checkpoint_dir)
        .with_output(args.output)
        .with_max_new_tokens(args.max_new_tokens);
    let document = use_case.execute(&args.input)?;

    println!("\n{document}\n");
    println!("Saved to {}", use_case.output().display());
    Ok(())
}
