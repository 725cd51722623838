//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use tokio::sync::broadcast;
use valetchat_core::logging::{read_all_entries, JsonLogEntry, LoggingBuilder};
use valetchat_core::store::paths;
use valetchat_core::{ChatConfig, ChatEngine, MemoryStore, MessageId, UserId};

pub const WAIT: Duration = Duration::from_secs(2);

/// Device name the test binary logs under.
pub const LOG_DEVICE: &str = "integration";

struct TestLogs {
    _dir: TempDir,
    root: PathBuf,
}

static LOGS: OnceLock<TestLogs> = OnceLock::new();

/// Install the JSONL subscriber once per test binary. Returns the logs dir.
pub fn init_tracing() -> &'static Path {
    let logs = LOGS.get_or_init(|| {
        let dir = TempDir::new().expect("create log dir");
        let root = dir.path().join("logs");
        LoggingBuilder::new(&root, LOG_DEVICE)
            .no_console()
            .with_filter("valetchat_core=debug")
            .init()
            .expect("install tracing subscriber");
        TestLogs { _dir: dir, root }
    });
    &logs.root
}

/// Everything logged so far by this test binary.
pub fn log_entries() -> Vec<JsonLogEntry> {
    read_all_entries(init_tracing()).expect("read log entries")
}

pub fn engine() -> (MemoryStore, ChatEngine) {
    init_tracing();
    let store = MemoryStore::new();
    let engine = ChatEngine::in_memory(store.clone(), ChatConfig::default());
    (store, engine)
}

pub fn user(id: &str) -> UserId {
    UserId::new(id)
}

pub fn seed_profile(store: &MemoryStore, id: &str, display_name: &str) {
    store.seed(
        &paths::user(&user(id)),
        json!({"phoneNumber": id, "displayName": display_name}),
    );
}

/// Store a message record without indexing it.
pub fn seed_record(store: &MemoryStore, id: &str, from: &str, to: &str, text: &str, sent_at_millis: i64) {
    store.seed(
        &paths::message(&MessageId::new(id)),
        json!({
            "senderId": from,
            "senderDisplayName": format!("User {}", from),
            "receiverId": to,
            "sentAt": "01/01/19",
            "sentAtMillis": sent_at_millis,
            "text": text,
        }),
    );
}

/// Index `id` for `owner`, firing child-added on their subscriptions.
pub fn seed_index(store: &MemoryStore, owner: &str, id: &str) {
    store.seed(&paths::conversation_index(&user(owner)).child(id), json!(1));
}

/// Store a text message and index it for both participants.
pub fn seed_text(store: &MemoryStore, id: &str, from: &str, to: &str, text: &str, sent_at_millis: i64) {
    seed_record(store, id, from, to, text, sent_at_millis);
    seed_index(store, from, id);
    seed_index(store, to, id);
}

/// Poll `condition` until it holds, failing the test after [`WAIT`].
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting for {}", what);
}

/// Receive events until `pick` returns `Some`, failing after [`WAIT`].
pub async fn next_matching<E: Clone, T>(
    rx: &mut broadcast::Receiver<E>,
    mut pick: impl FnMut(&E) -> Option<T>,
) -> T {
    let found = tokio::time::timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(found) = pick(&event) {
                        return found;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await;
    found.expect("timed out waiting for event")
}

/// Give the actors a chance to process anything pending.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}

pub async fn with_timeout<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(WAIT, fut).await.expect("timed out")
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 120, 200]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("encode png");
    buf
}
