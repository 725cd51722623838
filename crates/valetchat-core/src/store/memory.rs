//! In-process backend implementing the store, object store and downloader.
//!
//! `MemoryStore` keeps the whole database as a JSON tree and delivers
//! subscription events synchronously on write. It also records every written
//! path and can inject failures, which makes it the backend of choice for
//! exercising the synchronizers without a network.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use url::Url;

use super::{
    validate_key, ChildSnapshot, ChildStream, ConversationStore, ObjectStore, StorePath,
    StoredObject, ValueStream,
};
use crate::error::{ChatError, ChatResult};
use crate::media::MediaDownloader;

const MEMORY_URL_SCHEME: &str = "memory";
const MEMORY_URL_HOST: &str = "objects";

enum Sink {
    Child {
        tx: mpsc::UnboundedSender<ChatResult<ChildSnapshot>>,
        seen: HashSet<String>,
    },
    Value {
        tx: mpsc::UnboundedSender<ChatResult<Option<Value>>>,
        last: Option<Value>,
    },
}

struct Watcher {
    path: StorePath,
    sink: Sink,
}

struct StoredBlob {
    bytes: Bytes,
    content_type: String,
}

#[derive(Default)]
struct Faults {
    upload: Option<String>,
    download_status: Option<u16>,
    read_paths: HashSet<StorePath>,
    write: Option<String>,
    denied: bool,
}

struct Inner {
    root: Value,
    objects: HashMap<String, StoredBlob>,
    watchers: Vec<Watcher>,
    write_log: Vec<String>,
    keys: ulid::Generator,
    faults: Faults,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
            objects: HashMap::new(),
            watchers: Vec::new(),
            write_log: Vec::new(),
            keys: ulid::Generator::new(),
            faults: Faults::default(),
        }
    }
}

/// In-memory realtime store + object store. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `value` at `path` without recording it in the write log.
    ///
    /// Subscribers are notified exactly as for a regular write.
    pub fn seed(&self, path: &StorePath, value: Value) {
        let mut inner = self.inner.lock();
        set_node(&mut inner.root, path.segments(), value);
        notify(&mut inner);
    }

    /// Current value at `path`.
    pub fn value_at(&self, path: &StorePath) -> Option<Value> {
        let inner = self.inner.lock();
        node_at(&inner.root, path).cloned()
    }

    /// Every path written through [`ConversationStore::write_children`], in order.
    pub fn writes(&self) -> Vec<String> {
        self.inner.lock().write_log.clone()
    }

    /// Number of logged writes at or below `prefix`.
    pub fn writes_under(&self, prefix: &StorePath) -> usize {
        let prefix = prefix.to_string();
        self.inner
            .lock()
            .write_log
            .iter()
            .filter(|p| *p == &prefix || p.starts_with(&format!("{}/", prefix)))
            .count()
    }

    pub fn clear_write_log(&self) {
        self.inner.lock().write_log.clear();
    }

    /// Make every upload fail with `reason` (or succeed again with `None`).
    pub fn fail_uploads(&self, reason: Option<&str>) {
        self.inner.lock().faults.upload = reason.map(str::to_string);
    }

    /// Make every download answer with HTTP `status` (or succeed again with `None`).
    pub fn fail_downloads(&self, status: Option<u16>) {
        self.inner.lock().faults.download_status = status;
    }

    /// Make one-shot reads of `path` fail.
    pub fn fail_reads_at(&self, path: &StorePath) {
        self.inner.lock().faults.read_paths.insert(path.clone());
    }

    pub fn clear_read_failures(&self) {
        self.inner.lock().faults.read_paths.clear();
    }

    /// Make every write fail with `reason` (or succeed again with `None`).
    pub fn fail_writes(&self, reason: Option<&str>) {
        self.inner.lock().faults.write = reason.map(str::to_string);
    }

    /// Reject every operation as if security rules denied access.
    pub fn deny_access(&self, denied: bool) {
        self.inner.lock().faults.denied = denied;
    }

    /// Deliver the child-added event for `path/key` again to current subscribers,
    /// as a reconnecting client would. Returns whether the child exists.
    pub fn replay_child_added(&self, path: &StorePath, key: &str) -> bool {
        let inner = self.inner.lock();
        let Some(value) = node_at(&inner.root, &path.child(key)).cloned() else {
            return false;
        };
        for watcher in inner.watchers.iter().filter(|w| &w.path == path) {
            if let Sink::Child { tx, .. } = &watcher.sink {
                let _ = tx.send(Ok(ChildSnapshot {
                    key: key.to_string(),
                    value: value.clone(),
                }));
            }
        }
        true
    }

    /// Number of live subscriptions. Dropped streams are pruned first.
    pub fn active_subscriptions(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.watchers.retain(|w| !w.sink.is_closed());
        inner.watchers.len()
    }

    /// Bytes and content type of an uploaded object.
    pub fn object(&self, path: &StorePath) -> Option<(Bytes, String)> {
        self.inner
            .lock()
            .objects
            .get(&path.to_string())
            .map(|b| (b.bytes.clone(), b.content_type.clone()))
    }

    pub fn object_count(&self) -> usize {
        self.inner.lock().objects.len()
    }

    fn check_access(&self, what: &str) -> ChatResult<()> {
        if self.inner.lock().faults.denied {
            return Err(ChatError::PermissionDenied(what.to_string()));
        }
        Ok(())
    }
}

impl Sink {
    fn is_closed(&self) -> bool {
        match self {
            Sink::Child { tx, .. } => tx.is_closed(),
            Sink::Value { tx, .. } => tx.is_closed(),
        }
    }
}

fn node_at<'a>(root: &'a Value, path: &StorePath) -> Option<&'a Value> {
    let mut node = root;
    for segment in path.segments() {
        node = node.as_object()?.get(segment)?;
    }
    if node.is_null() {
        None
    } else {
        Some(node)
    }
}

/// Set `value` below `node`, removing null leaves and empty parents.
fn set_node(node: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *node = if value.is_null() {
            Value::Object(Map::new())
        } else {
            value
        };
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        if rest.is_empty() && value.is_null() {
            map.remove(head);
            return;
        }
        let child = map.entry(head.clone()).or_insert(Value::Null);
        if rest.is_empty() {
            *child = value;
        } else {
            set_node(child, rest, value);
        }
        let prune = child.is_null() || matches!(child, Value::Object(m) if m.is_empty());
        if prune {
            map.remove(head);
        }
    }
}

fn children_sorted(root: &Value, path: &StorePath) -> Vec<(String, Value)> {
    let mut children: Vec<(String, Value)> = node_at(root, path)
        .and_then(Value::as_object)
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    children.sort_by(|a, b| a.0.cmp(&b.0));
    children
}

/// Push pending events to every subscriber and drop closed ones.
fn notify(inner: &mut Inner) {
    let Inner { root, watchers, .. } = inner;
    watchers.retain_mut(|watcher| match &mut watcher.sink {
        Sink::Child { tx, seen } => {
            for (key, value) in children_sorted(root, &watcher.path) {
                if seen.insert(key.clone()) && tx.send(Ok(ChildSnapshot { key, value })).is_err() {
                    return false;
                }
            }
            !tx.is_closed()
        }
        Sink::Value { tx, last } => {
            let current = node_at(root, &watcher.path).cloned();
            if current != *last {
                *last = current.clone();
                if tx.send(Ok(current)).is_err() {
                    return false;
                }
            }
            !tx.is_closed()
        }
    });
}

fn receiver_stream<T: Send + 'static>(rx: mpsc::UnboundedReceiver<T>) -> BoxStream<'static, T> {
    futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
        .boxed()
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn read_once(&self, path: &StorePath) -> ChatResult<Option<Value>> {
        self.check_access(&format!("read {}", path))?;
        let inner = self.inner.lock();
        if inner.faults.read_paths.contains(path) {
            return Err(ChatError::Store(format!("read failed at {}", path)));
        }
        trace!(%path, "read_once");
        Ok(node_at(&inner.root, path).cloned())
    }

    fn observe_child_added(&self, path: &StorePath) -> ChildStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if inner.faults.denied {
            let _ = tx.send(Err(ChatError::PermissionDenied(format!("observe {}", path))));
            return receiver_stream(rx);
        }
        let mut seen = HashSet::new();
        for (key, value) in children_sorted(&inner.root, path) {
            seen.insert(key.clone());
            let _ = tx.send(Ok(ChildSnapshot { key, value }));
        }
        debug!(%path, existing = seen.len(), "child-added subscription opened");
        inner.watchers.push(Watcher {
            path: path.clone(),
            sink: Sink::Child { tx, seen },
        });
        receiver_stream(rx)
    }

    fn observe_value(&self, path: &StorePath) -> ValueStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        if inner.faults.denied {
            let _ = tx.send(Err(ChatError::PermissionDenied(format!("observe {}", path))));
            return receiver_stream(rx);
        }
        let current = node_at(&inner.root, path).cloned();
        let _ = tx.send(Ok(current.clone()));
        inner.watchers.push(Watcher {
            path: path.clone(),
            sink: Sink::Value { tx, last: current },
        });
        receiver_stream(rx)
    }

    async fn write_children(
        &self,
        path: &StorePath,
        children: Map<String, Value>,
    ) -> ChatResult<()> {
        self.check_access(&format!("write {}", path))?;
        let targets = children
            .into_iter()
            .map(|(key, value)| {
                let target = path.child(&key);
                if target.segments().len() == path.segments().len() {
                    return Err(ChatError::InvalidInput(format!("empty child key under {}", path)));
                }
                for segment in &target.segments()[path.segments().len()..] {
                    validate_key(segment)?;
                }
                Ok((target, value))
            })
            .collect::<ChatResult<Vec<_>>>()?;

        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.faults.write {
            return Err(ChatError::Store(reason.clone()));
        }
        for (target, value) in targets {
            set_node(&mut inner.root, target.segments(), value);
            inner.write_log.push(target.to_string());
        }
        notify(&mut inner);
        Ok(())
    }

    fn generate_key(&self, _path: &StorePath) -> String {
        let mut inner = self.inner.lock();
        inner
            .keys
            .generate()
            .unwrap_or_else(|_| ulid::Ulid::new())
            .to_string()
    }

    async fn exists(&self, path: &StorePath, child_key: &str) -> ChatResult<bool> {
        self.check_access(&format!("read {}", path))?;
        validate_key(child_key)?;
        let inner = self.inner.lock();
        Ok(node_at(&inner.root, &path.child(child_key)).is_some())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        path: &StorePath,
        bytes: Bytes,
        content_type: &str,
    ) -> ChatResult<StoredObject> {
        self.check_access(&format!("upload {}", path))?;
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.faults.upload {
            return Err(ChatError::Upload(reason.clone()));
        }
        let size = bytes.len();
        inner.objects.insert(
            path.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        debug!(%path, size, content_type, "object stored");
        Ok(StoredObject {
            path: path.clone(),
            size,
            content_type: content_type.to_string(),
        })
    }

    async fn download_url(&self, path: &StorePath) -> ChatResult<Url> {
        if !self.inner.lock().objects.contains_key(&path.to_string()) {
            return Err(ChatError::NotFound(format!("object {}", path)));
        }
        let raw = format!("{}://{}/{}", MEMORY_URL_SCHEME, MEMORY_URL_HOST, path);
        Url::parse(&raw).map_err(|e| ChatError::Upload(format!("bad download url {}: {}", raw, e)))
    }
}

#[async_trait]
impl MediaDownloader for MemoryStore {
    async fn fetch(&self, url: &Url) -> ChatResult<Bytes> {
        if url.scheme() != MEMORY_URL_SCHEME || url.host_str() != Some(MEMORY_URL_HOST) {
            return Err(ChatError::Download(format!("unsupported url {}", url)));
        }
        let inner = self.inner.lock();
        if let Some(status) = inner.faults.download_status {
            return Err(ChatError::Download(format!("HTTP {} for {}", status, url)));
        }
        let key = url.path().trim_start_matches('/');
        inner
            .objects
            .get(key)
            .map(|blob| blob.bytes.clone())
            .ok_or_else(|| ChatError::Download(format!("HTTP 404 for {}", url)))
    }
}
