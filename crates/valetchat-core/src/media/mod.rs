//! Media transfer: compression, upload and retrieval of photo/audio payloads.
//!
//! Outgoing photos are re-encoded as low-quality JPEG before upload. Audio is
//! uploaded as recorded. Uploaded objects are addressed by a durable download
//! URL, which is what message records reference.
//!
//! Downloads are a single attempt. Any transport failure or non-success status
//! surfaces as [`ChatError::Download`].

pub mod http;
pub mod recorder;

pub use http::HttpDownloader;
pub use recorder::{AudioRecorder, CaptureDevice, RecorderEvent};

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::chat::MessageBody;
use crate::config::{AudioProfile, MediaConfig};
use crate::error::{ChatError, ChatResult};
use crate::store::{paths, ObjectStore, StorePath};

const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Kind of media a message can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    /// Object-store folder for this kind.
    pub fn folder(&self) -> &'static str {
        match self {
            MediaKind::Image => paths::IMAGES,
            MediaKind::Audio => paths::AUDIO,
        }
    }
}

/// Fetches media bytes by URL.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    async fn fetch(&self, url: &Url) -> ChatResult<Bytes>;
}

/// Downloaded media attached to a timeline entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedMedia {
    Image { bytes: Bytes, width: u32, height: u32 },
    Audio { bytes: Bytes },
}

impl ResolvedMedia {
    pub fn kind(&self) -> MediaKind {
        match self {
            ResolvedMedia::Image { .. } => MediaKind::Image,
            ResolvedMedia::Audio { .. } => MediaKind::Audio,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        match self {
            ResolvedMedia::Image { bytes, .. } | ResolvedMedia::Audio { bytes } => bytes,
        }
    }
}

/// Decode any supported image and re-encode it as JPEG at `quality`.
pub fn compress_image(raw: &[u8], quality: u8) -> ChatResult<Bytes> {
    let img = image::load_from_memory(raw)?;
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buf = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;
    Ok(Bytes::from(buf))
}

/// Run CPU-bound image work on the blocking pool so sync actors keep moving.
async fn off_runtime<T, F>(work: F) -> ChatResult<T>
where
    F: FnOnce() -> ChatResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ChatError::Io(std::io::Error::other(e)))?
}

/// Uploads outgoing media and resolves incoming media references.
#[derive(Clone)]
pub struct MediaTransfer {
    objects: Arc<dyn ObjectStore>,
    downloader: Arc<dyn MediaDownloader>,
    config: MediaConfig,
    audio: AudioProfile,
}

impl MediaTransfer {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        downloader: Arc<dyn MediaDownloader>,
        config: MediaConfig,
        audio: AudioProfile,
    ) -> Self {
        Self {
            objects,
            downloader,
            config,
            audio,
        }
    }

    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Content type used when uploading `kind`.
    pub fn content_type(&self, kind: MediaKind) -> &str {
        match kind {
            MediaKind::Image => JPEG_CONTENT_TYPE,
            MediaKind::Audio => &self.audio.content_type,
        }
    }

    /// Fresh object path: `images/{ulid}` or `audio/{ulid}.m4a`.
    pub fn object_path(&self, kind: MediaKind) -> StorePath {
        let name = ulid::Ulid::new().to_string();
        let name = match kind {
            MediaKind::Image => name,
            MediaKind::Audio => format!("{}.{}", name, self.audio.file_extension),
        };
        StorePath::parse(kind.folder()).child(name)
    }

    /// Turn raw captured bytes into the payload that gets uploaded.
    pub fn prepare(&self, raw: &[u8], kind: MediaKind) -> ChatResult<Bytes> {
        if raw.is_empty() {
            return Err(ChatError::InvalidInput("empty media payload".to_string()));
        }
        match kind {
            MediaKind::Image => compress_image(raw, self.config.jpeg_quality),
            MediaKind::Audio => Ok(Bytes::copy_from_slice(raw)),
        }
    }

    /// Upload a prepared payload and return its durable download URL.
    pub async fn upload(&self, bytes: Bytes, kind: MediaKind) -> ChatResult<Url> {
        let path = self.object_path(kind);
        let content_type = self.content_type(kind).to_string();
        let stored = self
            .objects
            .put(&path, bytes, &content_type)
            .await
            .map_err(into_upload_error)?;
        let url = self
            .objects
            .download_url(&stored.path)
            .await
            .map_err(into_upload_error)?;
        debug!(path = %stored.path, size = stored.size, %url, "media uploaded");
        Ok(url)
    }

    /// [`prepare`](Self::prepare) then [`upload`](Self::upload).
    pub async fn prepare_and_upload(&self, raw: &[u8], kind: MediaKind) -> ChatResult<Url> {
        let bytes = match kind {
            MediaKind::Image if !raw.is_empty() => {
                let raw = raw.to_vec();
                let quality = self.config.jpeg_quality;
                off_runtime(move || compress_image(&raw, quality)).await?
            }
            _ => self.prepare(raw, kind)?,
        };
        self.upload(bytes, kind).await
    }

    /// Download the bytes behind `url`. One attempt, size-capped.
    pub async fn download(&self, url: &Url) -> ChatResult<Bytes> {
        let bytes = self.downloader.fetch(url).await.map_err(|e| match e {
            ChatError::Download(_) => e,
            e if e.is_access_error() => e,
            other => ChatError::Download(format!("{}: {}", url, other)),
        })?;
        if bytes.len() > self.config.max_download_bytes {
            warn!(%url, size = bytes.len(), "media exceeds download limit");
            return Err(ChatError::Download(format!(
                "{} is {} bytes, limit is {}",
                url,
                bytes.len(),
                self.config.max_download_bytes
            )));
        }
        Ok(bytes)
    }

    /// Download and decode the media a message body references.
    ///
    /// Returns `None` for text bodies.
    pub async fn resolve(&self, body: &MessageBody) -> ChatResult<Option<ResolvedMedia>> {
        let Some((kind, url)) = body.media_ref() else {
            return Ok(None);
        };
        let bytes = self.download(url).await?;
        let media = match kind {
            MediaKind::Image => {
                let encoded = bytes.clone();
                let (width, height) = off_runtime(move || {
                    let img = image::load_from_memory(&encoded)?;
                    Ok((img.width(), img.height()))
                })
                .await?;
                ResolvedMedia::Image {
                    width,
                    height,
                    bytes,
                }
            }
            MediaKind::Audio => ResolvedMedia::Audio { bytes },
        };
        Ok(Some(media))
    }
}

fn into_upload_error(e: ChatError) -> ChatError {
    match e {
        ChatError::Upload(_) => e,
        e if e.is_access_error() => e,
        other => ChatError::Upload(other.to_string()),
    }
}
