//! JSONL logging for ValetChat clients.
//!
//! Every device writes its own append-only JSONL file, so logs from several
//! simulated clients in one test run never interleave mid-line.
//!
//! ```text
//! logs/
//! └── raw/
//!     ├── 2026-01-21_ada-phone.jsonl
//!     └── 2026-01-21_bob-phone.jsonl
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use valetchat_core::logging::LoggingBuilder;
//!
//! let path = LoggingBuilder::new("./logs", "ada-phone")
//!     .with_filter("valetchat_core=debug")
//!     .init()?;
//! ```
//!
//! ```bash
//! # Every skipped message across devices
//! jq 'select(.msg == "skipping message")' logs/raw/*.jsonl
//! ```

pub mod entry;
pub mod layer;
pub mod writer;

pub use entry::JsonLogEntry;
pub use layer::{JsonlLayer, LoggingBuilder};
pub use writer::{read_all_entries, DeviceLogWriter};
