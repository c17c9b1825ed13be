mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

async fn seed_sessions(base_url: &str, batch: &str, ns: &[i64]) -> Result<()> {
    let client = reqwest::Client::new();
    let records: Vec<Value> = ns
        .iter()
        .map(|n| json!({"token": format!("tok-{}-{}", batch, n), "batch": batch, "n": n}))
        .collect();
    let res = client
        .post(format!("{}/api/data/sessions", base_url))
        .json(&Value::Array(records))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "setup seed failed");
    Ok(())
}

async fn batch_ns(base_url: &str, batch: &str) -> Result<Vec<i64>> {
    let client = reqwest::Client::new();
    let res = client.get(format!("{}/api/data/sessions", base_url)).send().await?;
    let body = res.json::<Value>().await?;
    let mut ns: Vec<i64> = body["data"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r["batch"] == json!(batch))
        .filter_map(|r| r["n"].as_i64())
        .collect();
    ns.sort();
    Ok(ns)
}

#[tokio::test]
async fn unfiltered_destroy_is_refused() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    seed_sessions(&server.base_url, "guard", &[1]).await?;

    // No body at all
    let res = client.delete(format!("{}/api/data/sessions", server.base_url)).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = res.json::<Value>().await?;
    assert_eq!(body["code"], "BAD_REQUEST");

    // An empty filter object is just as unfiltered
    let res = client
        .delete(format!("{}/api/data/sessions", server.base_url))
        .json(&json!({}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Limit alone bounds a wipe, it doesn't target one
    let res = client
        .delete(format!("{}/api/data/sessions", server.base_url))
        .json(&json!({"limit": 5}))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Nothing was deleted by any of the refused attempts
    assert_eq!(batch_ns(&server.base_url, "guard").await?, vec![1]);

    Ok(())
}

#[tokio::test]
async fn filtered_destroy_removes_exactly_the_matching_records() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    // Full collection {1,2,3,4,5}; the filter selects {2,4}
    seed_sessions(&server.base_url, "narrow", &[1, 2, 3, 4, 5]).await?;

    let filter = json!({
        "where_clause": { "batch": "narrow", "n": { "$in": [2, 4] } }
    });
    let res = client
        .delete(format!("{}/api/data/sessions", server.base_url))
        .json(&filter)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(res.text().await?.is_empty(), "destroy success has an empty body");

    assert_eq!(batch_ns(&server.base_url, "narrow").await?, vec![1, 3, 5]);

    Ok(())
}

#[tokio::test]
async fn destroy_matching_nothing_is_a_silent_success() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    seed_sessions(&server.base_url, "untouched", &[7]).await?;

    let filter = json!({ "where_clause": { "batch": "no-such-batch" } });
    let res = client
        .delete(format!("{}/api/data/sessions", server.base_url))
        .json(&filter)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    assert_eq!(batch_ns(&server.base_url, "untouched").await?, vec![7]);

    Ok(())
}
