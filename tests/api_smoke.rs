//! Smoke tests against a running server

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:4000/api";

/// Sign up a fresh account and return its token
async fn signup(client: &Client) -> String {
    let email = format!(
        "smoke-{}@example.com",
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    );

    let response = client
        .post(format!("{}/auth/signup", BASE_URL))
        .json(&json!({ "email": email, "password": "rainy-day" }))
        .send()
        .await
        .expect("Failed to send signup request");
    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse signup response");
    body["token"].as_str().expect("No token in response").to_string()
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({ "email": "nobody@example.com", "password": "wrong" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_profile_of_new_user() {
    let client = Client::new();
    let token = signup(&client).await;

    let response = client
        .get(format!("{}/user", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["nickname"], "Anonymous");
    assert!(body["current_rental_id"].is_null());
}

#[tokio::test]
#[ignore]
async fn test_nearby_rejects_bad_coordinates() {
    let client = Client::new();

    let response = client
        .get(format!("{}/stations/nearby?lat=123&lng=0", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}
