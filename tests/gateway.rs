//! End-to-end tests for the gateway endpoints.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::StatusCode;
use tokio_tungstenite::tungstenite::Message;

mod common;

fn sorted_lines(body: &str) -> Vec<String> {
    let mut lines: Vec<String> = body.lines().map(String::from).collect();
    lines.sort();
    lines
}

#[tokio::test]
async fn names_are_streamed_from_the_reservation_service() {
    let backend = common::start_backend(&["Dhaval", "Bhavin"]).await;
    let (gateway, _shutdown) = common::start_gateway(&common::gateway_config(&backend)).await;

    let response = reqwest::get(format!("http://{gateway}/reservations/names"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));

    let body = response.text().await.unwrap();
    assert_eq!(sorted_lines(&body), vec!["Bhavin", "Dhaval"]);
}

#[tokio::test]
async fn names_fall_back_when_the_reservation_service_is_down() {
    let backend = common::start_backend(&["Dhaval", "Bhavin"]).await;
    let mut config = common::gateway_config(&backend);
    config.gateway.reservations_url = format!("http://{}", common::unused_addr().await);
    let (gateway, _shutdown) = common::start_gateway(&config).await;

    let response = reqwest::get(format!("http://{gateway}/reservations/names"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "EEK!\n");
}

#[tokio::test]
async fn greetings_arrive_as_server_sent_events() {
    let backend = common::start_backend(&[]).await;
    let (gateway, _shutdown) = common::start_gateway(&common::gateway_config(&backend)).await;

    let response = reqwest::get(format!("http://{gateway}/greetings/Ann"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut body = response.bytes_stream();
    let mut text = String::new();
    let events = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let chunk = body.next().await.unwrap().unwrap();
            text.push_str(&String::from_utf8_lossy(&chunk));
            let events: Vec<String> = text
                .lines()
                .filter_map(|line| line.strip_prefix("data: "))
                .map(String::from)
                .collect();
            if events.len() >= 3 {
                break events;
            }
        }
    })
    .await
    .unwrap();

    for event in events.iter().take(3) {
        let greeting: serde_json::Value = serde_json::from_str(event).unwrap();
        assert!(greeting["message"].as_str().unwrap().starts_with("Hello Ann @ "));
    }
}

#[tokio::test]
async fn websocket_greets_each_name_received() {
    let backend = common::start_backend(&[]).await;
    let (gateway, _shutdown) = common::start_gateway(&common::gateway_config(&backend)).await;

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{gateway}/ws/greetings"))
        .await
        .unwrap();
    socket.send(Message::text("Bo".to_string())).await.unwrap();

    for _ in 0..3 {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(frame.to_text().unwrap().starts_with("Hello Bo @ "));
    }
}

#[tokio::test]
async fn proxy_rule_rewrites_path_and_adds_cors_header() {
    let backend = common::start_backend(&[]).await;
    let (upstream, seen) = common::start_recording_upstream("proxied").await;
    let mut config = common::gateway_config(&backend);
    config.routes[0].uri = format!("http://{upstream}");
    let (gateway, _shutdown) = common::start_gateway(&config).await;

    let response = reqwest::Client::new()
        .get(format!("http://{gateway}/proxy?page=2"))
        .header("Host", "api.foo.bar")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(response.text().await.unwrap(), "proxied");
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        ["GET /reservations?page=2 HTTP/1.1".to_string()]
    );
}

#[tokio::test]
async fn proxy_rule_reaches_the_reservation_frontage() {
    let backend = common::start_backend(&["Sid"]).await;
    let (gateway, _shutdown) = common::start_gateway(&common::gateway_config(&backend)).await;

    let response = reqwest::Client::new()
        .get(format!("http://{gateway}/proxy"))
        .header("Host", "x.foo.bar")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    let record: serde_json::Value = serde_json::from_str(body.trim()).unwrap();
    assert_eq!(record["name"], "Sid");
    assert!(record["id"].is_i64());
}

#[tokio::test]
async fn unmatched_requests_are_not_found() {
    let backend = common::start_backend(&[]).await;
    let (gateway, _shutdown) = common::start_gateway(&common::gateway_config(&backend)).await;

    let wrong_host = reqwest::Client::new()
        .get(format!("http://{gateway}/proxy"))
        .header("Host", "foo.bar")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_host.status(), StatusCode::NOT_FOUND);

    let wrong_path = reqwest::get(format!("http://{gateway}/elsewhere")).await.unwrap();
    assert_eq!(wrong_path.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dead_upstream_is_a_bad_gateway() {
    let backend = common::start_backend(&[]).await;
    let mut config = common::gateway_config(&backend);
    config.routes[0].uri = format!("http://{}", common::unused_addr().await);
    let (gateway, _shutdown) = common::start_gateway(&config).await;

    let response = reqwest::Client::new()
        .get(format!("http://{gateway}/proxy"))
        .header("Host", "api.foo.bar")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let backend = common::start_backend(&[]).await;
    let (gateway, _shutdown) = common::start_gateway(&common::gateway_config(&backend)).await;

    let response = reqwest::get(format!("http://{gateway}/reservations/names"))
        .await
        .unwrap();
    let id = response.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn gateway_startup_fails_without_greeting_endpoint() {
    let backend = common::start_backend(&[]).await;
    let mut config = common::gateway_config(&backend);
    config.gateway.greeting_rpc.port = common::unused_addr().await.port();

    let result =
        reactive_mesh::greeting::GreetingClient::connect(&config.gateway.greeting_rpc).await;
    assert!(matches!(
        result,
        Err(reactive_mesh::rpc::RpcError::Connect { .. })
    ));
}
