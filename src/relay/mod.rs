//! Relay module: line classification and webhook delivery.

mod classifier;
mod message;
mod sink;
mod timestamp;

pub use classifier::{
    Classification, ClassifierError, CountingClassifier, LineClassifier, RelayFormatter,
};
pub use message::OutboundMessage;
pub use sink::{
    ConsoleSink, DeliveryError, RelaySink, WebhookPayload, WebhookSink, DEFAULT_REQUEST_TIMEOUT,
};
pub use timestamp::{extract_log_timestamp, relative_time_tag, unix_now};
