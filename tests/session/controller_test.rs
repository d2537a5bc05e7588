use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use fleet_chat_relay::config::{AppConfig, ClassifierMode, RelayConfig};
use fleet_chat_relay::relay::{DeliveryError, OutboundMessage, RelaySink};
use fleet_chat_relay::session::{SessionController, SessionError, SessionPhase};
use fleet_chat_relay::watcher::LogEncoding;
use tempfile::TempDir;

/// Sink that records every message content it is given.
#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelaySink for RecordingSink {
    async fn send(
        &self,
        message: &OutboundMessage,
        _config: &RelayConfig,
    ) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(message.content());
        Ok(())
    }
}

fn header(listener: &str) -> String {
    format!(
        "\r\n\r\n  ---------------------------------------------------------------\r\n\r\n\
         \x20 Channel ID:      -1234\r\n\
         \x20 Channel Name:    Fleet\r\n\
         \x20 Listener:        {listener}\r\n\
         \x20 Session started: 2024.01.01 00:00:00\r\n\
         \x20 ---------------------------------------------------------------\r\n"
    )
}

fn write_log(dir: &TempDir, name: &str, listener: &str, age_secs: u64) -> PathBuf {
    let path = dir.path().join(name);
    let mut bytes = LogEncoding::Utf16Le.bom().to_vec();
    bytes.extend(LogEncoding::Utf16Le.encode(&header(listener)));
    std::fs::write(&path, bytes).unwrap();
    let file = File::options().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
        .unwrap();
    path
}

fn append(path: &Path, text: &str) {
    let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(&LogEncoding::Utf16Le.encode(text)).unwrap();
}

fn config(dir: &TempDir) -> AppConfig {
    AppConfig {
        webhook_endpoint: "https://example.com/api/webhooks/1/token".to_string(),
        include_timestamps: false,
        log_dir: Some(dir.path().to_path_buf()),
        poll_interval_ms: 10,
        ..AppConfig::default()
    }
}

async fn wait_until<F: Fn() -> bool>(check: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_load_relays_newest_log() {
    let dir = TempDir::new().unwrap();
    write_log(&dir, "Fleet_20240101_000000.txt", "Alice", 3600);
    let newer = write_log(&dir, "Fleet_20240102_000000.txt", "Alice", 60);

    let sink = Arc::new(RecordingSink::default());
    let mut controller = SessionController::new(config(&dir), sink.clone());

    let source = controller.load("Alice").await.unwrap();
    assert_eq!(source.path, newer);
    assert_eq!(sink.sent(), vec!["Relaying fleet chat for `Alice`"]);

    let status = controller.current_status();
    assert_eq!(status.phase, SessionPhase::Tailing);
    assert_eq!(status.log_file.as_deref(), Some("Fleet_20240102_000000.txt"));

    append(&newer, "[ 2024.01.02 00:00:01 ] Bob > hello\r\n");
    append(&newer, "   \r\n");
    append(&newer, "[ 2024.01.02 00:00:02 ] Eve > x  \r\n");
    wait_until(|| sink.sent().len() == 3).await;

    controller.stop().await;
    assert_eq!(
        sink.sent(),
        vec![
            "Relaying fleet chat for `Alice`",
            "[ 2024.01.02 00:00:01 ] Bob > hello",
            "[ 2024.01.02 00:00:02 ] Eve > x",
        ]
    );
    let status = controller.current_status();
    assert_eq!(status.phase, SessionPhase::Stopped);
    assert_eq!(status.stats.lines_read, 3);
    assert_eq!(status.stats.messages_relayed, 3);
}

#[tokio::test]
async fn test_history_is_not_resent() {
    let dir = TempDir::new().unwrap();
    let log = write_log(&dir, "Fleet_1.txt", "Alice", 10);
    append(&log, "[ 2024.01.01 00:00:01 ] Bob > old news\r\n");

    let sink = Arc::new(RecordingSink::default());
    let mut controller = SessionController::new(config(&dir), sink.clone());
    controller.load("Alice").await.unwrap();

    append(&log, "fresh\r\n");
    wait_until(|| sink.sent().len() == 2).await;
    controller.stop().await;
    assert_eq!(sink.sent()[1], "fresh");
    assert!(!sink.sent().iter().any(|m| m.contains("old news")));
}

#[tokio::test]
async fn test_timestamps_prefix_render_tag() {
    let dir = TempDir::new().unwrap();
    let log = write_log(&dir, "Fleet_1.txt", "Alice", 10);

    let sink = Arc::new(RecordingSink::default());
    let mut config = config(&dir);
    config.include_timestamps = true;
    let mut controller = SessionController::new(config, sink.clone());
    controller.load("Alice").await.unwrap();

    append(&log, "  ping  \r\n");
    wait_until(|| sink.sent().len() == 2).await;
    controller.stop().await;

    let relayed = &sink.sent()[1];
    assert!(relayed.starts_with("<t:"), "got {relayed}");
    assert!(relayed.ends_with(":R> ping"), "got {relayed}");
}

#[tokio::test]
async fn test_restart_stops_previous_session() {
    let dir = TempDir::new().unwrap();
    let alice = write_log(&dir, "Fleet_1.txt", "Alice", 20);
    let bob = write_log(&dir, "Fleet_2.txt", "Bob", 10);

    let sink = Arc::new(RecordingSink::default());
    let mut controller = SessionController::new(config(&dir), sink.clone());

    controller.load("Alice").await.unwrap();
    append(&alice, "from alice\r\n");
    wait_until(|| sink.sent().len() == 2).await;

    let source = controller.load("Bob").await.unwrap();
    assert_eq!(source.path, bob);
    assert_eq!(controller.active_identity(), Some("Bob"));
    assert_eq!(sink.sent().len(), 3);
    assert_eq!(sink.sent()[2], "Relaying fleet chat for `Bob`");

    append(&alice, "alice again\r\n");
    append(&bob, "from bob\r\n");
    wait_until(|| sink.sent().len() == 4).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.shutdown().await;

    let sent = sink.sent();
    assert_eq!(sent[3], "from bob");
    assert!(!sent.iter().any(|m| m == "alice again"));
    assert_eq!(sent.len(), 4);
}

#[tokio::test]
async fn test_no_log_found_leaves_no_session() {
    let dir = TempDir::new().unwrap();
    write_log(&dir, "Fleet_1.txt", "Alice", 10);

    let sink = Arc::new(RecordingSink::default());
    let mut controller = SessionController::new(config(&dir), sink.clone());

    let err = controller.load("alice").await.unwrap_err();
    assert!(matches!(err, SessionError::NoLogFound(_)), "got {err:?}");
    assert!(!controller.is_active());
    assert!(controller.active_source().is_none());

    let status = controller.current_status();
    assert_eq!(status.phase, SessionPhase::Failed);
    assert!(status.last_error.unwrap().contains("alice"));
    assert!(sink.sent().is_empty());

    // A failed load does not prevent the next one.
    controller.load("Alice").await.unwrap();
    assert!(controller.is_active());
    controller.stop().await;
}

#[tokio::test]
async fn test_missing_directory_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut config = config(&dir);
    config.log_dir = Some(dir.path().join("missing"));

    let mut controller = SessionController::new(config, Arc::new(RecordingSink::default()));
    let err = controller.load("Alice").await.unwrap_err();
    assert!(matches!(err, SessionError::NoLogFound(_)), "got {err:?}");
    assert_eq!(controller.current_status().phase, SessionPhase::Failed);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let dir = TempDir::new().unwrap();
    write_log(&dir, "Fleet_1.txt", "Alice", 10);
    let mut controller = SessionController::new(config(&dir), Arc::new(RecordingSink::default()));

    controller.stop().await;
    controller.load("Alice").await.unwrap();
    controller.stop().await;
    controller.stop().await;
    assert_eq!(controller.current_status().phase, SessionPhase::Stopped);
    assert!(!controller.is_active());
}

#[tokio::test]
async fn test_counting_mode_updates_counter() {
    let dir = TempDir::new().unwrap();
    let log = write_log(&dir, "Fleet_1.txt", "Alice", 10);

    let sink = Arc::new(RecordingSink::default());
    let mut config = config(&dir);
    config.mode = ClassifierMode::Count;
    config.webhook_endpoint = String::new();
    let mut controller = SessionController::new(config, sink.clone());
    let counter = controller.counter();

    controller.load("Alice").await.unwrap();
    assert_eq!(*counter.borrow(), 0);

    append(&log, "[ 2024.01.01 00:00:01 ] Bob > x\r\n");
    append(&log, "[ 2024.01.01 00:00:02 ] Eve > x5\r\n");
    append(&log, "[ 2024.01.01 00:00:03 ] Joe > 3x\r\n");
    wait_until(|| *counter.borrow() == 9).await;

    append(&log, "[ 2024.01.01 00:00:04 ] FC > reset - go\r\n");
    wait_until(|| *counter.borrow() == 0).await;

    append(&log, "[ 2024.01.01 00:00:05 ] Bob > xxxxx\r\n");
    wait_until(|| *counter.borrow() == 5).await;

    controller.reset_counter().await;
    wait_until(|| *counter.borrow() == 0).await;

    controller.stop().await;
    assert!(sink.sent().is_empty(), "counting mode never posts");
}

#[tokio::test]
async fn test_increment_cap_clamps() {
    let dir = TempDir::new().unwrap();
    let log = write_log(&dir, "Fleet_1.txt", "Alice", 10);

    let mut config = config(&dir);
    config.mode = ClassifierMode::Count;
    config.increment_cap = Some(25);
    let mut controller = SessionController::new(config, Arc::new(RecordingSink::default()));
    let counter = controller.counter();

    controller.load("Alice").await.unwrap();
    append(&log, "[ 2024.01.01 00:00:01 ] Bob > x100\r\n");
    wait_until(|| *counter.borrow() == 25).await;
    controller.stop().await;
}

#[tokio::test]
async fn test_config_changes_do_not_affect_running_session() {
    let dir = TempDir::new().unwrap();
    let log = write_log(&dir, "Fleet_1.txt", "Alice", 10);

    let sink = Arc::new(RecordingSink::default());
    let mut controller = SessionController::new(config(&dir), sink.clone());
    controller.load("Alice").await.unwrap();

    let mut changed = controller.config().clone();
    changed.include_timestamps = true;
    controller.set_config(changed);

    append(&log, "plain\r\n");
    wait_until(|| sink.sent().len() == 2).await;
    controller.stop().await;
    assert_eq!(sink.sent()[1], "plain");
}

#[tokio::test]
async fn test_deleted_log_stops_session() {
    let dir = TempDir::new().unwrap();
    let log = write_log(&dir, "Fleet_1.txt", "Alice", 10);

    let mut controller =
        SessionController::new(config(&dir), Arc::new(RecordingSink::default()));
    let mut status = controller.status();
    controller.load("Alice").await.unwrap();

    std::fs::remove_file(&log).unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        status.wait_for(|s| s.phase == SessionPhase::Stopped),
    )
    .await
    .unwrap()
    .unwrap();

    let current = controller.current_status();
    assert!(current.last_error.unwrap().contains("deleted"));
    assert!(!controller.is_active());

    // Stopping after a terminal failure is still a no-op.
    controller.stop().await;
    assert_eq!(controller.current_status().phase, SessionPhase::Stopped);
}
