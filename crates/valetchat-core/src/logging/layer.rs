//! Custom tracing Layer that writes to JSONL files.

use std::fmt::Write as FmtWrite;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer};

use super::entry::JsonLogEntry;
use super::writer::DeviceLogWriter;
use crate::error::{ChatError, ChatResult};

/// Filter used when neither the builder nor `RUST_LOG` sets one.
const DEFAULT_FILTER: &str = "valetchat_core=info";

/// A tracing Layer that appends every event to the device's JSONL file.
pub struct JsonlLayer {
    writer: Arc<DeviceLogWriter>,
}

impl JsonlLayer {
    pub fn new(logs_dir: impl AsRef<Path>, device: impl Into<String>) -> std::io::Result<Self> {
        let writer = DeviceLogWriter::new(logs_dir, device)?;
        Ok(Self {
            writer: Arc::new(writer),
        })
    }

    pub fn log_path(&self) -> &Path {
        self.writer.path()
    }

    pub fn device(&self) -> &str {
        self.writer.device()
    }
}

impl<S> Layer<S> for JsonlLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = metadata.level().as_str().to_lowercase();

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let mut entry = JsonLogEntry::new(
            level,
            self.writer.device(),
            metadata.target(),
            visitor.message.unwrap_or_default(),
        );
        if !visitor.fields.is_empty() {
            entry = entry.with_fields(serde_json::Value::Object(visitor.fields));
        }
        if let Some(scope) = ctx.event_scope(event) {
            let spans: Vec<&str> = scope.from_root().map(|span| span.name()).collect();
            if !spans.is_empty() {
                entry = entry.with_span(spans.join(" > "));
            }
        }

        // Logging must never take the client down.
        let _ = self.writer.write(&entry);
    }
}

#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    fields: serde_json::Map<String, serde_json::Value>,
}

impl JsonVisitor {
    fn insert(&mut self, field: &Field, value: serde_json::Value) {
        self.fields.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(&mut buf, "{:?}", value);
        if field.name() == "message" {
            self.message = Some(buf);
        } else {
            self.insert(field, serde_json::Value::String(buf));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.insert(field, serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.insert(field, serde_json::Value::Number(n));
        }
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, serde_json::Value::String(value.to_string()));
    }
}

/// Builder for the process-wide tracing subscriber.
pub struct LoggingBuilder {
    logs_dir: PathBuf,
    device: String,
    console_output: bool,
    env_filter: Option<String>,
}

impl LoggingBuilder {
    pub fn new(logs_dir: impl Into<PathBuf>, device: impl Into<String>) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            device: device.into(),
            console_output: true,
            env_filter: None,
        }
    }

    /// Only write JSONL, nothing to stderr.
    pub fn no_console(mut self) -> Self {
        self.console_output = false;
        self
    }

    /// Filter directives, e.g. `"valetchat_core=debug"`. Overrides `RUST_LOG`.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Build the JSONL layer alone, for manual composition.
    pub fn build_layer(&self) -> std::io::Result<JsonlLayer> {
        JsonlLayer::new(&self.logs_dir, &self.device)
    }

    fn filter(&self) -> ChatResult<EnvFilter> {
        match &self.env_filter {
            Some(directives) => EnvFilter::try_new(directives)
                .map_err(|e| ChatError::InvalidInput(format!("bad log filter: {}", e))),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
        }
    }

    /// Install the global subscriber. Returns the JSONL file path.
    pub fn init(self) -> ChatResult<PathBuf> {
        let filter = self.filter()?;
        let jsonl = self.build_layer()?;
        let path = jsonl.log_path().to_path_buf();
        let console = self
            .console_output
            .then(|| tracing_subscriber::fmt::layer().with_target(true));

        tracing_subscriber::registry()
            .with(filter)
            .with(jsonl)
            .with(console)
            .try_init()
            .map_err(|e| ChatError::InvalidInput(format!("logging already initialized: {}", e)))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_jsonl_layer_captures_events() {
        let temp = TempDir::new().unwrap();
        let layer = JsonlLayer::new(temp.path().join("logs"), "test").unwrap();
        let log_path = layer.log_path().to_path_buf();

        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("open_conversation");
            let _guard = span.enter();
            tracing::info!("conversation opened");
            tracing::warn!(message_id = "m1", retries = 0u64, "skipping message");
        });

        let content = std::fs::read_to_string(&log_path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first = JsonLogEntry::from_json_line(lines[0]).unwrap();
        assert_eq!(first.level, "info");
        assert_eq!(first.msg, "conversation opened");
        assert_eq!(first.span.as_deref(), Some("open_conversation"));

        let second = JsonLogEntry::from_json_line(lines[1]).unwrap();
        let fields = second.fields.unwrap();
        assert_eq!(fields["message_id"], "m1");
        assert_eq!(fields["retries"], 0);
    }

    #[test]
    fn test_bad_filter_rejected() {
        let temp = TempDir::new().unwrap();
        let builder = LoggingBuilder::new(temp.path(), "test").with_filter("valetchat_core=loud");
        assert!(matches!(builder.filter(), Err(ChatError::InvalidInput(_))));
    }
}
