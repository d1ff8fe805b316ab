use clap::Parser;
use std::sync::Arc;
use titanic_api::domain::ports::Predictor;
use titanic_api::utils::{logger, validation::Validate};
use titanic_api::{AppError, AppState, InferencePipeline, LocalStorage, ServeConfig};

fn exit_with(e: &AppError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.severity().exit_code());
}

#[tokio::main]
async fn main() {
    let config = ServeConfig::parse();

    logger::init_logger(config.verbose, config.log_json);

    tracing::info!("Starting titanic-api");
    tracing::debug!("Serve config: {:?}", config);

    if let Err(e) = config.validate() {
        exit_with(&e);
    }

    // The service never comes up without a usable model.
    let (storage, file_name) = LocalStorage::for_file(&config.model_path);
    let pipeline = match InferencePipeline::load(&storage, &file_name).await {
        Ok(pipeline) => pipeline,
        Err(e) => exit_with(&e),
    };
    if let Err(reason) = pipeline.readiness() {
        exit_with(&AppError::ArtifactError {
            path: config.model_path.clone(),
            reason,
        });
    }

    let state = AppState::loaded(Arc::new(pipeline));
    let addr = match config.socket_addr().await {
        Ok(addr) => addr,
        Err(e) => exit_with(&e),
    };

    if let Err(e) = titanic_api::serve(addr, state).await {
        exit_with(&e);
    }
}
