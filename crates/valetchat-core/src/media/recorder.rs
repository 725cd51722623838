//! Voice message recording.
//!
//! The platform microphone is behind [`CaptureDevice`]. [`AudioRecorder`]
//! asks for permission, records to a fresh `.m4a` file with the configured
//! [`AudioProfile`], and reports failures as [`RecorderEvent::UnableToRecord`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::AudioProfile;
use crate::error::{ChatError, ChatResult};

const RECORDER_EVENT_CAPACITY: usize = 16;

/// Platform audio capture.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Ask the user for microphone access. `false` means denied.
    async fn request_permission(&self) -> bool;

    /// Begin recording to `path` using `profile`.
    async fn start(&self, path: &Path, profile: &AudioProfile) -> ChatResult<()>;

    /// Stop recording. Returns whether the file was finalized successfully.
    async fn stop(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderEvent {
    Started { path: PathBuf },
    Finished { path: PathBuf },
    UnableToRecord { reason: String },
}

pub struct AudioRecorder {
    device: Arc<dyn CaptureDevice>,
    profile: AudioProfile,
    dir: PathBuf,
    current: Mutex<Option<PathBuf>>,
    events: broadcast::Sender<RecorderEvent>,
}

impl AudioRecorder {
    /// Recordings are written under `dir`.
    pub fn new(device: Arc<dyn CaptureDevice>, profile: AudioProfile, dir: impl Into<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(RECORDER_EVENT_CAPACITY);
        Self {
            device,
            profile,
            dir: dir.into(),
            current: Mutex::new(None),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.events.subscribe()
    }

    pub fn is_recording(&self) -> bool {
        self.current.lock().is_some()
    }

    /// Request permission and start a new recording. Returns its file path.
    pub async fn start(&self) -> ChatResult<PathBuf> {
        if self.is_recording() {
            return Err(ChatError::Recording("already recording".to_string()));
        }
        if !self.device.request_permission().await {
            return Err(self.unable("microphone permission denied"));
        }

        let path = self
            .dir
            .join(format!("{}.{}", ulid::Ulid::new(), self.profile.file_extension));
        if let Err(e) = self.device.start(&path, &self.profile).await {
            return Err(self.unable(&e.to_string()));
        }

        *self.current.lock() = Some(path.clone());
        info!(path = %path.display(), sample_rate = self.profile.sample_rate_hz, "recording started");
        let _ = self.events.send(RecorderEvent::Started { path: path.clone() });
        Ok(path)
    }

    /// Stop the current recording.
    ///
    /// Returns the finished file, or `None` if nothing was recording or the
    /// device failed to finalize it.
    pub async fn finish(&self) -> Option<PathBuf> {
        let path = self.current.lock().take()?;
        if !self.device.stop().await {
            self.unable("recording did not finish successfully");
            return None;
        }
        info!(path = %path.display(), "recording finished");
        let _ = self.events.send(RecorderEvent::Finished { path: path.clone() });
        Some(path)
    }

    /// Read a finished recording for upload.
    pub async fn read_recording(&self, path: &Path) -> ChatResult<Bytes> {
        Ok(Bytes::from(tokio::fs::read(path).await?))
    }

    fn unable(&self, reason: &str) -> ChatError {
        warn!(reason, "unable to record");
        let _ = self.events.send(RecorderEvent::UnableToRecord {
            reason: reason.to_string(),
        });
        ChatError::Recording(reason.to_string())
    }
}
