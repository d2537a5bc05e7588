//! Relay module tests.

mod sink_test;

/// Verify all public relay types are exported from the library.
#[test]
fn test_all_relay_types_exported() {
    use fleet_chat_relay::relay::{
        Classification, ConsoleSink, CountingClassifier, DeliveryError, LineClassifier,
        OutboundMessage, RelayFormatter, WebhookPayload, WebhookSink, DEFAULT_REQUEST_TIMEOUT,
    };

    let _ = CountingClassifier::new(None).unwrap();
    let _ = RelayFormatter::new(true, fleet_chat_relay::config::TimestampSource::WallClock);
    let _ = WebhookSink::new(DEFAULT_REQUEST_TIMEOUT).unwrap();
    let _ = ConsoleSink;
    let _: fn() -> DeliveryError = || DeliveryError::Timeout;
    let _: fn() -> Classification = || Classification::Ignored;
    let _: fn(&OutboundMessage) -> WebhookPayload =
        |m| WebhookPayload::new(m, &fleet_chat_relay::config::RelayConfig::default());
    let _: Option<LineClassifier> = None;
}
