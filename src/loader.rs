//! Unit loading — turns a source id into playable units.
//!
//! DESIGN
//! ======
//! The engine asks a [`UnitLoader`] for the media of a source and installs
//! the result when it arrives. [`CatalogLoader`] asks the server's media
//! catalog:
//! - png files become a [`FrameSequenceUnit`]
//! - an mp4 becomes a [`StreamUnit`]
//! - billboard sources also get the project's first music file as audio
//!
//! A missing music track is not an error; the billboard plays silent.

use std::time::Duration;

use frames::{MediaData, MediaFile, MediaListResponse};
use tracing::{debug, info};

use crate::playable::{FrameSequenceUnit, PlayableUnit, StreamUnit, UnitKind};
use crate::source::SourceRef;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid source id: {0}")]
    InvalidSource(String),

    #[error("catalog client build failed: {0}")]
    HttpClientBuild(String),

    #[error("catalog request failed: {0}")]
    Request(String),

    #[error("catalog returned status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("no playable files for {0}")]
    Empty(String),
}

/// Units for one source: the visual unit and an optional audio track.
pub struct LoadedMedia {
    pub visual: Box<dyn PlayableUnit>,
    pub audio: Option<Box<dyn PlayableUnit>>,
}

impl LoadedMedia {
    #[must_use]
    pub fn visual(unit: impl PlayableUnit + 'static) -> Self {
        Self { visual: Box::new(unit), audio: None }
    }

    #[must_use]
    pub fn with_audio(mut self, unit: impl PlayableUnit + 'static) -> Self {
        self.audio = Some(Box::new(unit));
        self
    }
}

#[async_trait::async_trait]
pub trait UnitLoader: Send + Sync {
    /// Fetch and build the units for `source`.
    ///
    /// # Errors
    ///
    /// Returns a [`LoadError`] when the source cannot be resolved to media.
    async fn load(&self, source: &str) -> Result<LoadedMedia, LoadError>;
}

// =============================================================================
// CATALOG LOADER
// =============================================================================

pub struct CatalogLoader {
    http: reqwest::Client,
    base_url: String,
    kind: Option<UnitKind>,
}

impl CatalogLoader {
    /// `kind` forces a unit variant; `None` picks one from the file types.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::HttpClientBuild`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration, kind: Option<UnitKind>) -> Result<Self, LoadError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned(), kind })
    }

    async fn fetch(&self, path: &str) -> Result<MediaData, LoadError> {
        let url = format!("{}/api/media/projects/{path}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| LoadError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(LoadError::Status { url, status });
        }

        let body: MediaListResponse = response
            .json()
            .await
            .map_err(|e| LoadError::Request(e.to_string()))?;
        Ok(body.data)
    }

    fn absolute(&self, file: &MediaFile) -> String {
        if file.url.starts_with("http://") || file.url.starts_with("https://") {
            file.url.clone()
        } else {
            format!("{}{}", self.base_url, file.url)
        }
    }

    async fn music_track(&self, project: &str) -> Option<StreamUnit> {
        let data = match self.fetch(&format!("{project}/music")).await {
            Ok(data) => data,
            Err(e) => {
                debug!(%project, error = %e, "loader: no music for billboard");
                return None;
            }
        };
        let first = media_files(data).into_iter().next()?;
        info!(%project, file = %first.file_name, "loader: billboard music attached");
        Some(StreamUnit::loaded(self.absolute(&first), None))
    }
}

#[async_trait::async_trait]
impl UnitLoader for CatalogLoader {
    async fn load(&self, source: &str) -> Result<LoadedMedia, LoadError> {
        let target = SourceRef::parse(source).ok_or_else(|| LoadError::InvalidSource(source.to_owned()))?;

        let path = match &target.subfolder {
            Some(sub) => format!("{}/{}/{sub}", target.project, target.media_type),
            None => format!("{}/{}", target.project, target.media_type),
        };
        let files = media_files(self.fetch(&path).await?);
        let urls: Vec<String> = files.iter().map(|f| self.absolute(f)).collect();

        let visual = build_visual(&files, urls, self.kind).ok_or_else(|| LoadError::Empty(source.to_owned()))?;
        let mut media = LoadedMedia { visual, audio: None };

        if target.media_type == "billboard" {
            if let Some(track) = self.music_track(&target.project).await {
                media = media.with_audio(track);
            }
        }
        Ok(media)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Flatten a catalog payload. Albums without a subfolder use the lowest-numbered one.
#[must_use]
pub fn media_files(data: MediaData) -> Vec<MediaFile> {
    match data {
        MediaData::Files(files) => files,
        MediaData::Thumb(file) => vec![file],
        MediaData::Album(mut folders) => {
            let first = folders
                .keys()
                .min_by_key(|name| (name.parse::<u64>().unwrap_or(u64::MAX), (*name).clone()))
                .cloned();
            first.and_then(|name| folders.remove(&name)).unwrap_or_default()
        }
    }
}

fn build_visual(files: &[MediaFile], urls: Vec<String>, kind: Option<UnitKind>) -> Option<Box<dyn PlayableUnit>> {
    let is_video = |f: &MediaFile| f.file_name.to_ascii_lowercase().ends_with(".mp4");
    let kind = kind.unwrap_or_else(|| {
        if files.iter().any(|f| !is_video(f)) {
            UnitKind::FrameSequence
        } else {
            UnitKind::Stream
        }
    });

    match kind {
        UnitKind::Stream => {
            let url = files
                .iter()
                .zip(&urls)
                .find(|(f, _)| is_video(f))
                .map(|(_, url)| url.clone())
                .or_else(|| urls.first().cloned())?;
            Some(Box::new(StreamUnit::loaded(url, None)))
        }
        UnitKind::FrameSequence => {
            let frames: Vec<String> = files
                .iter()
                .zip(urls)
                .filter(|(f, _)| !is_video(f))
                .map(|(_, url)| url)
                .collect();
            if frames.is_empty() {
                return None;
            }
            Some(Box::new(FrameSequenceUnit::new(frames)))
        }
    }
}

#[cfg(test)]
#[path = "loader_test.rs"]
mod tests;
