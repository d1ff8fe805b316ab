use clap::Parser;
use std::time::Duration;
use titanic_api::adapters::resolve_dataset;
use titanic_api::utils::{logger, validation::Validate};
use titanic_api::{AppError, LocalStorage, TrainingConfig, TrainingJob};

#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Fits the survival pipeline and writes pipeline.json and meta.json")]
struct Args {
    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Labeled CSV; the reference dataset is downloaded when it does not exist
    #[arg(long)]
    data: Option<String>,

    /// URL of the reference dataset
    #[arg(long)]
    fallback_url: Option<String>,

    /// Directory receiving the artifact and metadata
    #[arg(long)]
    model_dir: Option<String>,

    /// Inverse regularization strength
    #[arg(long)]
    c: Option<f64>,

    #[arg(long)]
    max_iter: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Show the resolved settings without training
    #[arg(long)]
    dry_run: bool,
}

fn fail(e: AppError) -> ! {
    tracing::error!(
        "❌ Training failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.severity().exit_code());
}

fn resolve_config(args: &Args) -> Result<TrainingConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            TrainingConfig::from_file(path)?
        }
        None => TrainingConfig::default(),
    };

    if let Some(data) = &args.data {
        config.data.path = data.clone();
    }
    if let Some(url) = &args.fallback_url {
        config.data.fallback_url = url.clone();
    }
    if let Some(dir) = &args.model_dir {
        config.output.model_dir = dir.clone();
    }
    if let Some(c) = args.c {
        config.model.c = c;
    }
    if let Some(max_iter) = args.max_iter {
        config.model.max_iter = max_iter;
    }

    config.validate()?;
    Ok(config)
}

fn display_config_summary(config: &TrainingConfig) {
    println!("📋 Training configuration:");
    println!("  Dataset:      {}", config.data.path);
    println!("  Fallback URL: {}", config.data.fallback_url);
    println!("  Artifact:     {}", config.artifact_path());
    println!(
        "  Solver:       C={} max_iter={} tolerance={}",
        config.model.c, config.model.max_iter, config.model.tolerance
    );
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    logger::init_logger(args.verbose, args.log_json);
    tracing::info!("🚀 Starting training");

    let config = resolve_config(&args).unwrap_or_else(|e| fail(e));
    display_config_summary(&config);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No training will occur");
        return;
    }

    let source = resolve_dataset(
        &config.data.path,
        &config.data.fallback_url,
        Duration::from_secs(config.data.download_timeout_seconds),
    )
    .unwrap_or_else(|e| fail(e));

    let storage = LocalStorage::new(config.output.model_dir.clone());
    let job = TrainingJob::new(
        storage,
        source,
        config.solver_params(),
        config.output_files(),
    );

    match job.run().await {
        Ok(summary) => {
            println!("✅ Model saved to {}", summary.artifact_path);
            println!("📁 Metadata saved to {}", summary.metadata_path);
            println!(
                "📊 {} samples, training accuracy {:.3}",
                summary.metadata.n_samples, summary.metadata.training_accuracy
            );
        }
        Err(e) => fail(e),
    }
}
