mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn root_lists_registered_resources() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert!(body["success"].as_bool().unwrap_or(false), "success flag missing: {}", body);
    let resources = body["data"]["resources"].as_array().expect("resources array");
    assert!(resources.contains(&json!("users")), "users resource missing: {}", body);

    Ok(())
}

#[tokio::test]
async fn list_users_basic() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/api/data/users", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::OK, "expected 200 OK, got {}", res.status());

    let body = res.json::<serde_json::Value>().await?;
    assert!(body["success"].as_bool().unwrap_or(false), "success flag missing: {}", body);
    assert!(body["data"].is_array(), "data should be an array: {}", body);

    Ok(())
}

#[tokio::test]
async fn unknown_resource_is_404() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(format!("{}/api/data/nonsense", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["code"], "NOT_FOUND");

    Ok(())
}

#[tokio::test]
async fn single_record_lifecycle() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let base = format!("{}/api/data/users", server.base_url);

    // Create
    let res = client
        .post(&base)
        .json(&json!({"name": "solo", "email": "solo@example.com", "role": "editor"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<serde_json::Value>().await?;
    assert!(body["data"].is_object(), "single create returns one object: {}", body);
    let id = body["data"]["id"].as_str().expect("created id").to_string();
    assert!(body["data"]["created_at"].is_string(), "created_at stamped: {}", body);

    // Fetch
    let res = client.get(format!("{}/{}", base, id)).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["name"], "solo");

    // Full update
    let res = client
        .put(format!("{}/{}", base, id))
        .json(&json!({"name": "solo2", "email": "solo2@example.com"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    // Partial update leaves the rest alone
    let res = client
        .patch(format!("{}/{}", base, id))
        .json(&json!({"role": "admin"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["data"]["name"], "solo2");
    assert_eq!(body["data"]["role"], "admin");

    // Delete
    let res = client.delete(format!("{}/{}", base, id)).send().await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client.get(format!("{}/{}", base, id)).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn single_create_validation_failure() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/api/data/users", server.base_url))
        .json(&json!({"name": "incomplete"}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["field_errors"]["email"], "This field is required");

    Ok(())
}

#[tokio::test]
async fn malformed_record_id_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res =
        client.get(format!("{}/api/data/users/not-a-uuid", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
