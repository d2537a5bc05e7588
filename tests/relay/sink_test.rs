use std::time::Duration;

use fleet_chat_relay::config::RelayConfig;
use fleet_chat_relay::relay::{
    DeliveryError, OutboundMessage, RelaySink, WebhookSink, DEFAULT_REQUEST_TIMEOUT,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn relay_config(endpoint: String) -> RelayConfig {
    RelayConfig {
        webhook_endpoint: endpoint,
        include_timestamps: false,
        display_name: "Fleet Chat Relay".to_string(),
        avatar_url: "https://example.com/a.gif".to_string(),
        request_timeout: DEFAULT_REQUEST_TIMEOUT,
    }
}

#[tokio::test]
async fn test_webhook_posts_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/webhooks/1/token"))
        .and(header("content-type", "application/json"))
        .and(body_json(serde_json::json!({
            "username": "Fleet Chat Relay",
            "avatar_url": "https://example.com/a.gif",
            "content": "<t:1700000000:R> Bob > x",
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let sink = WebhookSink::new(Duration::from_secs(5)).unwrap();
    let config = relay_config(format!("{}/api/webhooks/1/token", server.uri()));
    let message = OutboundMessage::new("Bob > x").with_timestamp_tag("<t:1700000000:R>");

    tokio_test::assert_ok!(sink.send(&message, &config).await);
}

#[tokio::test]
async fn test_webhook_accepts_200() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let sink = WebhookSink::new(Duration::from_secs(5)).unwrap();
    let config = relay_config(server.uri());
    tokio_test::assert_ok!(sink.send(&OutboundMessage::new("hi"), &config).await);
}

#[tokio::test]
async fn test_webhook_non_2xx_is_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Unknown Webhook"))
        .mount(&server)
        .await;

    let sink = WebhookSink::new(Duration::from_secs(5)).unwrap();
    let config = relay_config(server.uri());
    let err = sink
        .send(&OutboundMessage::new("hi"), &config)
        .await
        .unwrap_err();

    match err {
        DeliveryError::Status { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "Unknown Webhook");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_webhook_long_error_body_is_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("e".repeat(4096)))
        .mount(&server)
        .await;

    let sink = WebhookSink::new(Duration::from_secs(5)).unwrap();
    let err = sink
        .send(&OutboundMessage::new("hi"), &relay_config(server.uri()))
        .await
        .unwrap_err();
    let DeliveryError::Status { body, .. } = err else {
        panic!("expected status error");
    };
    assert_eq!(body.len(), 512);
}

#[tokio::test]
async fn test_webhook_timeout_follows_session_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    // Client default is generous; the session snapshot asks for less.
    let sink = WebhookSink::new(Duration::from_secs(10)).unwrap();
    let config = RelayConfig {
        request_timeout: Duration::from_millis(200),
        ..relay_config(server.uri())
    };
    let started = std::time::Instant::now();
    let err = sink
        .send(&OutboundMessage::new("hi"), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Timeout), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_webhook_connection_refused() {
    // Bind then drop a listener to get a port nobody is serving.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sink = WebhookSink::new(Duration::from_secs(2)).unwrap();
    let err = sink
        .send(&OutboundMessage::new("hi"), &relay_config(format!("http://{addr}/hook")))
        .await
        .unwrap_err();
    assert!(matches!(err, DeliveryError::Network(_)), "got {err:?}");
}
