use crate::core::schema;
use crate::domain::model::{FeatureRow, PredictionResponse, RawPredictionRequest};
use crate::domain::ports::Predictor;
use crate::utils::error::{Result, ValidationError};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const SERVICE_NAME: &str = "Titanic Survival API";

/// The model as seen by request handlers. Never mutated after startup.
#[derive(Clone)]
pub enum ModelState {
    Loaded(Arc<dyn Predictor>),
    Unavailable(Arc<str>),
}

#[derive(Clone)]
pub struct AppState {
    model: ModelState,
}

impl AppState {
    pub fn loaded(predictor: Arc<dyn Predictor>) -> Self {
        Self {
            model: ModelState::Loaded(predictor),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason: String = reason.into();
        Self {
            model: ModelState::Unavailable(Arc::from(reason)),
        }
    }

    fn predictor(&self) -> std::result::Result<&Arc<dyn Predictor>, ApiError> {
        match &self.model {
            ModelState::Loaded(predictor) => Ok(predictor),
            ModelState::Unavailable(reason) => Err(ApiError::NotReady(reason.to_string())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

/// Every failure a handler can return. Converted to a JSON body at the boundary.
#[derive(Debug)]
pub enum ApiError {
    MalformedBody { status: StatusCode, detail: String },
    Invalid(ValidationError),
    NotReady(String),
    PredictionFailed,
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedBody {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::MalformedBody { status, detail } => (status, ErrorBody { detail, field: None }),
            ApiError::Invalid(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    detail: format!("Invalid field '{}': {}", err.field, err.reason),
                    field: Some(err.field.as_str()),
                },
            ),
            ApiError::NotReady(reason) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody {
                    detail: format!("Model not ready: {}", reason),
                    field: None,
                },
            ),
            ApiError::PredictionFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    detail: "Prediction failed".to_string(),
                    field: None,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/predict", post(predict))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/health",
        "ready": "/ready",
        "predict": "/predict",
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn ready(State(state): State<AppState>) -> std::result::Result<Json<Value>, ApiError> {
    state.predictor()?.readiness().map_err(ApiError::NotReady)?;
    Ok(Json(json!({ "status": "ready" })))
}

async fn predict(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RawPredictionRequest>, JsonRejection>,
) -> std::result::Result<Json<PredictionResponse>, ApiError> {
    let Json(raw) = payload?;

    let validated = schema::validate(raw).map_err(|e| {
        tracing::warn!("Rejected request: {}", e);
        ApiError::Invalid(e)
    })?;
    let row = FeatureRow::from(validated);

    let response = state.predictor()?.predict(&row).map_err(|e| {
        tracing::error!("❌ Inference failed for {:?}: {}", row, e);
        ApiError::PredictionFailed
    })?;

    tracing::debug!(
        "Predicted {} (p={:.4}) for household of {}",
        response.prediction,
        response.probability,
        row.household_size
    );
    Ok(Json(response))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        "🚀 {} listening on http://{}",
        SERVICE_NAME,
        listener.local_addr()?
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
