use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use titanic_api::core::training::{fit_pipeline, parse_dataset, SolverParams};
use titanic_api::domain::model::{FeatureRow, PredictionResponse};
use titanic_api::domain::ports::Predictor;
use titanic_api::utils::error::InferenceError;
use titanic_api::{router, AppState, InferencePipeline};

const TRAINING_CSV: &str = "\
survived,pclass,sex,age,sibsp,parch,fare,embarked
0,3,male,22.0,1,0,7.25,S
1,1,female,38.0,1,0,71.2833,C
1,3,female,26.0,0,0,7.925,S
1,1,female,35.0,1,0,53.1,S
0,3,male,35.0,0,0,8.05,S
0,3,male,,0,0,8.4583,Q
0,1,male,54.0,0,0,51.8625,S
0,3,male,2.0,3,1,21.075,S
1,3,female,27.0,0,2,11.1333,S
1,2,female,14.0,1,0,30.0708,C
1,3,female,4.0,1,1,16.7,S
1,1,female,58.0,0,0,26.55,S
0,3,male,20.0,0,0,8.05,S
0,3,male,39.0,1,5,31.275,S
0,3,female,14.0,0,0,7.8542,S
1,2,female,55.0,0,0,16.0,S
0,3,male,2.0,4,1,29.125,Q
1,2,male,,0,0,13.0,S
0,3,female,31.0,1,0,18.0,S
1,3,female,,0,0,7.225,C
";

fn trained_pipeline() -> InferencePipeline {
    let rows = parse_dataset(TRAINING_CSV.as_bytes()).unwrap();
    fit_pipeline(&rows, &SolverParams::default()).unwrap().pipeline
}

async fn spawn_server(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_trained_server() -> String {
    spawn_server(AppState::loaded(Arc::new(trained_pipeline()))).await
}

fn example_request() -> Value {
    json!({
        "pclass": 3,
        "age": 29,
        "fare": 7.25,
        "sibsp": 0,
        "parch": 0,
        "sex": "male",
        "embarked": "S"
    })
}

async fn post_predict(base: &str, body: &Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{}/predict", base))
        .json(body)
        .send()
        .await
        .unwrap()
}

struct BrokenPredictor;

impl Predictor for BrokenPredictor {
    fn predict(&self, _row: &FeatureRow) -> Result<PredictionResponse, InferenceError> {
        Err(InferenceError::NonFiniteScore)
    }

    fn readiness(&self) -> Result<(), String> {
        Ok(())
    }
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let base = spawn_trained_server().await;
    let body: Value = reqwest::get(&base).await.unwrap().json().await.unwrap();

    assert_eq!(body["service"], "Titanic Survival API");
    assert_eq!(body["health"], "/health");
    assert_eq!(body["ready"], "/ready");
    assert_eq!(body["predict"], "/predict");
}

#[tokio::test]
async fn test_health_and_ready_with_loaded_model() {
    let base = spawn_trained_server().await;

    let health = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(health.status(), 200);
    assert_eq!(health.json::<Value>().await.unwrap(), json!({"status": "ok"}));

    let ready = reqwest::get(format!("{}/ready", base)).await.unwrap();
    assert_eq!(ready.status(), 200);
}

#[tokio::test]
async fn test_unloaded_model_is_not_ready_but_healthy() {
    let base = spawn_server(AppState::unavailable("artifact missing")).await;

    let health = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(health.status(), 200);

    let ready = reqwest::get(format!("{}/ready", base)).await.unwrap();
    assert_eq!(ready.status(), 503);
    let body: Value = ready.json().await.unwrap();
    assert!(body["detail"].as_str().unwrap().contains("artifact missing"));

    let predict = post_predict(&base, &example_request()).await;
    assert_eq!(predict.status(), 503);
}

#[tokio::test]
async fn test_predict_example_passenger() {
    let base = spawn_trained_server().await;

    let response = post_predict(&base, &example_request()).await;
    assert_eq!(response.status(), 200);
    let first: PredictionResponse = response.json().await.unwrap();

    assert!(first.prediction == 0 || first.prediction == 1);
    assert!((0.0..=1.0).contains(&first.probability));
    assert_eq!(first.prediction == 1, first.probability >= 0.5);

    for _ in 0..5 {
        let again: PredictionResponse = post_predict(&base, &example_request())
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(again, first);
    }
}

#[tokio::test]
async fn test_predict_matches_in_process_pipeline() {
    let pipeline = trained_pipeline();
    let expected = pipeline
        .predict(&FeatureRow {
            pclass: titanic_api::domain::model::PassengerClass::Third,
            age: Some(29.0),
            fare: Some(7.25),
            household_size: 1,
            sex: titanic_api::domain::model::Sex::Male,
            embarked: titanic_api::domain::model::Port::Southampton,
        })
        .unwrap();

    let base = spawn_server(AppState::loaded(Arc::new(pipeline))).await;
    let served: PredictionResponse = post_predict(&base, &example_request())
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(served.probability.to_bits(), expected.probability.to_bits());
}

#[tokio::test]
async fn test_predict_normalizes_categories() {
    let base = spawn_trained_server().await;

    let mut body = example_request();
    body["sex"] = json!("  MALE ");
    body["embarked"] = json!(" s");
    let normalized: PredictionResponse = post_predict(&base, &body).await.json().await.unwrap();
    let canonical: PredictionResponse = post_predict(&base, &example_request())
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(normalized, canonical);
}

#[tokio::test]
async fn test_predict_accepts_missing_age_and_fare() {
    let base = spawn_trained_server().await;

    let body = json!({
        "pclass": 2,
        "sibsp": 1,
        "parch": 2,
        "sex": "female",
        "embarked": "Q"
    });
    let response = post_predict(&base, &body).await;
    assert_eq!(response.status(), 200);
    let out: PredictionResponse = response.json().await.unwrap();
    assert!((0.0..=1.0).contains(&out.probability));
}

#[tokio::test]
async fn test_invalid_fields_name_the_field() {
    let base = spawn_trained_server().await;

    let cases = [
        ("pclass", json!(4)),
        ("pclass", json!(2.5)),
        ("parch", json!(0.5)),
        ("sex", json!("other")),
        ("embarked", json!("X")),
        ("sibsp", json!(-1)),
        ("fare", json!(-3.5)),
    ];

    for (field, value) in cases {
        let mut body = example_request();
        body[field] = value;
        let response = post_predict(&base, &body).await;
        assert_eq!(response.status(), 422, "field {field}");
        let error: Value = response.json().await.unwrap();
        assert_eq!(error["field"], field);
        assert!(error["detail"].as_str().unwrap().contains(field));
    }
}

#[tokio::test]
async fn test_whole_float_counts_match_integers() {
    let base = spawn_trained_server().await;

    let mut as_floats = example_request();
    as_floats["pclass"] = json!(3.0);
    as_floats["sibsp"] = json!(0.0);

    let expected: PredictionResponse = post_predict(&base, &example_request())
        .await
        .json()
        .await
        .unwrap();
    let response = post_predict(&base, &as_floats).await;
    assert_eq!(response.status(), 200);
    let out: PredictionResponse = response.json().await.unwrap();
    assert_eq!(out, expected);
}

#[tokio::test]
async fn test_malformed_body_is_client_error() {
    let base = spawn_trained_server().await;

    let response = reqwest::Client::new()
        .post(format!("{}/predict", base))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let error: Value = response.json().await.unwrap();
    assert!(error["detail"].is_string());
    assert!(error.get("field").is_none());

    let missing_sex = json!({
        "pclass": 1, "age": 30, "fare": 10.0, "sibsp": 0, "parch": 0, "embarked": "S"
    });
    let response = post_predict(&base, &missing_sex).await;
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_inference_failure_is_distinct_from_validation() {
    let base = spawn_server(AppState::loaded(Arc::new(BrokenPredictor))).await;

    let response = post_predict(&base, &example_request()).await;
    assert_eq!(response.status(), 500);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["detail"], "Prediction failed");
}

#[tokio::test]
async fn test_concurrent_requests_agree() {
    let base = spawn_trained_server().await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let base = base.clone();
        handles.push(tokio::spawn(async move {
            post_predict(&base, &example_request())
                .await
                .json::<PredictionResponse>()
                .await
                .unwrap()
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
}
