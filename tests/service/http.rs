//! HTTP integration tests.
//!
//! Starts an axum server on an ephemeral port and exercises it with
//! reqwest, using real time and small fixed stage delays.

use contention_lab::path::PathTimings;
use contention_lab::Operation;
use contention_lab::service::{REQUEST_ID_HEADER, RESPONSE_TIME_HEADER};
use serde_json::{json, Value};

use crate::support::{contended, fast_path, start_server};

#[tokio::test]
async fn process_order_fast_path() {
    let base = start_server(fast_path()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/orders/process"))
        .json(&json!({ "orderId": 1234 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let request_id = resp.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&request_id).is_ok());
    assert!(resp.headers().contains_key(RESPONSE_TIME_HEADER));

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["orderId"], 1234);
    assert_eq!(body["status"], "Processed");
    assert_eq!(body["contended"], false);
    assert!(body["processingTimeMs"].as_u64().is_some());
}

#[tokio::test]
async fn update_inventory_without_body_gets_random_id() {
    let base = start_server(fast_path()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/inventory/update"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    let id = body["updateId"].as_i64().unwrap();
    assert!((1000..10_000).contains(&id));
}

#[tokio::test]
async fn update_inventory_echoes_product_fields() {
    let base = start_server(fast_path()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/inventory/update"))
        .json(&json!({ "updateId": 7, "productId": 55, "quantityChange": -3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["updateId"], 7);
    assert_eq!(body["productId"], 55);
    assert_eq!(body["quantityChange"], -3);
}

#[tokio::test]
async fn opposite_order_pair_times_out() {
    let ctx = contended(false, PathTimings::fixed(100, 200, 20));
    let base = start_server(ctx.clone()).await;
    let client = reqwest::Client::new();

    let (order, inventory) = tokio::join!(
        client
            .post(format!("{base}/orders/process"))
            .json(&json!({ "orderId": 1 }))
            .send(),
        client
            .post(format!("{base}/inventory/update"))
            .json(&json!({ "updateId": 2 }))
            .send(),
    );
    let order = order.unwrap();
    let inventory = inventory.unwrap();
    assert!(order.status() == 408 || inventory.status() == 408);

    let (timed_out, id_field) = if order.status() == 408 {
        (order, "orderId")
    } else {
        (inventory, "updateId")
    };
    let body: Value = timed_out.json().await.unwrap();
    assert_eq!(body["status"], "Timeout");
    assert!(body[id_field].as_i64().is_some());
    assert!(body["processingTimeMs"].as_u64().unwrap() >= 100);

    let health = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(health.status(), 503);
    let report: Value = health.json().await.unwrap();
    assert_eq!(report["status"], "Unhealthy");

    let locks: Value = client
        .get(format!("{base}/locks"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let locks = locks.as_array().unwrap();
    assert_eq!(locks.len(), 2);
    assert!(locks.iter().all(|l| l["held"] == false));
    assert!(locks.iter().map(|l| l["timeouts"].as_u64().unwrap()).sum::<u64>() >= 1);
}

#[tokio::test]
async fn health_polling_does_not_hide_a_deadlock() {
    let ctx = contended(false, PathTimings::fixed(100, 200, 20));
    let base = start_server(ctx).await;
    let client = reqwest::Client::new();

    let (order, inventory) = tokio::join!(
        client.post(format!("{base}/orders/process")).send(),
        client.post(format!("{base}/inventory/update")).send(),
    );
    assert!(order.unwrap().status() == 408 || inventory.unwrap().status() == 408);

    for _ in 0..40 {
        let resp = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(resp.status(), 503);
        assert!(resp.headers().contains_key(REQUEST_ID_HEADER));
    }

    let metrics: Value = client
        .get(format!("{base}/metrics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["snapshot"]["totalRequests"], 2);
    assert!(metrics["snapshot"]["timeoutRate"].as_f64().unwrap() >= 50.0);
    assert_eq!(metrics["verdict"]["status"], "Unhealthy");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let ctx = fast_path();
    let base = start_server(ctx.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/orders/process"))
        .json(&json!({ "orderId": "abc" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert!(resp.headers().contains_key(RESPONSE_TIME_HEADER));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "Error");
    assert!(body["processingTimeMs"].as_u64().is_some());

    let orders = ctx.operation_stats(Operation::Order).snapshot();
    assert_eq!(orders.total_requests, 0);
    assert_eq!(ctx.snapshot().failed_requests, 1);
}

#[tokio::test]
async fn consistent_order_pair_succeeds() {
    let ctx = contended(true, PathTimings::fixed(2000, 50, 20));
    let base = start_server(ctx).await;
    let client = reqwest::Client::new();

    let (order, inventory) = tokio::join!(
        client.post(format!("{base}/orders/process")).send(),
        client.post(format!("{base}/inventory/update")).send(),
    );
    assert_eq!(order.unwrap().status(), 200);
    assert_eq!(inventory.unwrap().status(), 200);

    let metrics: Value = client
        .get(format!("{base}/metrics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(metrics["snapshot"]["timeoutRequests"], 0);
    assert_eq!(metrics["snapshot"]["successfulRequests"], 2);
    assert_eq!(metrics["verdict"]["status"], "Healthy");
    assert_eq!(metrics["workerPool"]["busyWorkers"], 0);
}

#[tokio::test]
async fn per_operation_metrics() {
    let base = start_server(fast_path()).await;
    let client = reqwest::Client::new();

    for _ in 0..3 {
        let resp = client
            .post(format!("{base}/orders/process"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let orders: Value = client
        .get(format!("{base}/orders/metrics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(orders["totalRequests"], 3);
    assert_eq!(orders["successfulRequests"], 3);
    assert_eq!(orders["deadlockDetected"], 0);
    assert_eq!(orders["successRate"], 100.0);

    let inventory: Value = client
        .get(format!("{base}/inventory/metrics"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(inventory["totalRequests"], 0);
}

#[tokio::test]
async fn health_is_ok_when_idle() {
    let base = start_server(fast_path()).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key(REQUEST_ID_HEADER));

    let body: Value = resp.json().await.unwrap();
    assert_ne!(body["status"], "Unhealthy");
    let checks = body["checks"].as_array().unwrap();
    assert!(checks.iter().any(|c| c["name"] == "performance"));
    assert!(checks.iter().any(|c| c["name"] == "memory"));
}
