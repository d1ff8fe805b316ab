use anyhow::Context;
use clap::Parser;
use serde_json::{json, Value};
use std::time::Duration;
use titanic_api::utils::validation::Validate;
use titanic_api::ClientConfig;

fn sample_passengers() -> Vec<Value> {
    vec![
        json!({
            "pclass": 3, "age": 29, "fare": 7.25,
            "sibsp": 0, "parch": 0, "sex": "male", "embarked": "S"
        }),
        json!({
            "pclass": 1, "age": 38, "fare": 71.2833,
            "sibsp": 1, "parch": 0, "sex": "female", "embarked": "C"
        }),
        json!({
            "pclass": 2, "age": 21, "fare": 13.0,
            "sibsp": 0, "parch": 1, "sex": "female", "embarked": "Q"
        }),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::parse();
    config.validate().context("invalid client configuration")?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()
        .context("failed to build HTTP client")?;
    let url = config.predict_url();

    for (i, payload) in sample_passengers().iter().enumerate() {
        let response = client
            .post(&url)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("POST {} failed", url))?;

        println!("\n--- Case {} ---", i + 1);
        println!("POST {}", url);
        println!("Sent: {}", payload);
        println!("Status: {}", response.status());

        let body = response.text().await.context("failed to read response body")?;
        match serde_json::from_str::<Value>(&body) {
            Ok(json) => println!("Response: {}", json),
            Err(_) => println!("Non-JSON response: {}", body),
        }
    }

    Ok(())
}
