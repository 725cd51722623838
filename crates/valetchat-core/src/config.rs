//! Runtime configuration for ValetChat.
//!
//! Every knob has a default matching the shipped client; hosts override
//! individual values with the `with_*` setters or load a [`ChatConfig`] from
//! JSON.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default capacity for timeline/roster broadcast channels.
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 64;

/// Default number of one-shot message reads in flight per subscription.
const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// JPEG quality for outgoing photos (0.2 compression factor).
const DEFAULT_JPEG_QUALITY: u8 = 20;

const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 15;

/// 10 MB cap on downloaded media.
const DEFAULT_MAX_DOWNLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Top-level configuration passed to [`crate::ChatEngine::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Capacity of each timeline/roster broadcast channel.
    pub event_channel_capacity: usize,
    /// Maximum concurrent one-shot reads per subscription.
    pub fetch_concurrency: usize,
    /// Roster label for photo messages.
    pub photo_label: String,
    /// Roster label for audio messages.
    pub audio_label: String,
    pub media: MediaConfig,
    pub audio: AudioProfile,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            photo_label: "[Photo]".to_string(),
            audio_label: "[Audio]".to_string(),
            media: MediaConfig::default(),
            audio: AudioProfile::default(),
        }
    }
}

impl ChatConfig {
    pub fn with_fetch_concurrency(mut self, n: usize) -> Self {
        self.fetch_concurrency = n.max(1);
        self
    }

    pub fn with_event_channel_capacity(mut self, n: usize) -> Self {
        self.event_channel_capacity = n.max(1);
        self
    }

    pub fn with_media(mut self, media: MediaConfig) -> Self {
        self.media = media;
        self
    }

    /// Parse a configuration from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Media compression and transfer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// JPEG quality (1-100) used when re-encoding outgoing photos.
    pub jpeg_quality: u8,
    /// Per-request timeout for media downloads, in seconds.
    pub download_timeout_secs: u64,
    /// Downloads larger than this are rejected.
    pub max_download_bytes: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            max_download_bytes: DEFAULT_MAX_DOWNLOAD_BYTES,
        }
    }
}

impl MediaConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }
}

/// Audio encoder format requested from the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    /// MPEG-4 AAC
    Aac,
}

/// Encoder quality hint passed to the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncoderQuality {
    Low,
    Medium,
    High,
}

/// Recording profile for voice messages: single channel, low sample rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioProfile {
    pub format: AudioFormat,
    pub sample_rate_hz: u32,
    pub channels: u8,
    pub quality: EncoderQuality,
    /// File extension of recordings (without the dot).
    pub file_extension: String,
    /// Content type used when uploading recordings.
    pub content_type: String,
}

impl Default for AudioProfile {
    fn default() -> Self {
        Self {
            format: AudioFormat::Aac,
            sample_rate_hz: 12_000,
            channels: 1,
            quality: EncoderQuality::High,
            file_extension: "m4a".to_string(),
            content_type: "audio/mp4".to_string(),
        }
    }
}
