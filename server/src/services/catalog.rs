//! Media catalog — startup scan of the media tree.
//!
//! DESIGN
//! ======
//! The tree is scanned once at startup and served read-only afterwards:
//!
//! ```text
//! <media_dir>/
//!   <project>/
//!     poster/     png or mp4, sorted by file name
//!     phone/      png or mp4
//!     billboard/  png or mp4
//!     music/      mp3
//!     album/1/    png or mp4 per numbered subfolder
//!     thumb.png
//! ```
//!
//! URLs point at the static mount (`/media/<project>/...`). The legacy
//! top-level `mp4` and `png_sequence` folders are not projects.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use frames::{MediaData, MediaFile};
use serde::Serialize;
use tracing::{info, warn};

/// Media types accepted by the lookup routes.
pub const MEDIA_TYPES: &[&str] = &["poster", "phone", "music", "billboard", "album", "thumb"];

const SKIPPED_FOLDERS: &[&str] = &["mp4", "png_sequence"];
const VISUAL_EXTENSIONS: &[&str] = &["png", "mp4"];
const MUSIC_EXTENSIONS: &[&str] = &["mp3"];
const THUMB_FILE: &str = "thumb.png";
const URL_ROOT: &str = "/media";

/// Used when the tree holds nothing playable.
pub const FALLBACK_SOURCE: &str = "0";

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Project not found")]
    ProjectNotFound(String),
    #[error("Invalid media type. Must be one of: {}", MEDIA_TYPES.join(", "))]
    InvalidMediaType(String),
    #[error("Album subfolder '{0}' not found")]
    SubfolderNotFound(String),
    #[error("No {0} found for this project")]
    Empty(String),
    #[error("media scan failed: {0}")]
    Io(#[from] io::Error),
}

// =============================================================================
// CATALOG
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Project {
    pub name: String,
    pub poster: Vec<MediaFile>,
    pub phone: Vec<MediaFile>,
    pub music: Vec<MediaFile>,
    pub billboard: Vec<MediaFile>,
    /// `None` when the project has no `album/` folder at all.
    pub album: Option<BTreeMap<String, Vec<MediaFile>>>,
    pub thumb: Option<MediaFile>,
}

impl Project {
    fn has_album(&self) -> bool {
        self.album.as_ref().is_some_and(|a| !a.is_empty())
    }

    fn album_count(&self) -> usize {
        self.album.as_ref().map_or(0, BTreeMap::len)
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaCounts {
    pub poster: usize,
    pub phone: usize,
    pub music: usize,
    pub billboard: usize,
    pub album: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub name: String,
    pub has_poster: bool,
    pub has_phone: bool,
    pub has_music: bool,
    pub has_billboard: bool,
    pub has_album: bool,
    pub has_thumb: bool,
    pub counts: MediaCounts,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    pub project_count: usize,
    pub projects: Vec<ProjectSummary>,
}

/// A project's thumbnail, as listed by `/api/media/thumbnails`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thumbnail {
    pub project_name: String,
    pub file_name: String,
    pub url: String,
}

/// Scanned projects keyed (and therefore ordered) by name.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct Catalog {
    projects: BTreeMap<String, Project>,
}

impl Catalog {
    /// Scan `base`. A missing directory yields an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Io`] when an existing directory cannot be read.
    pub fn scan(base: &Path) -> Result<Self, CatalogError> {
        if !base.is_dir() {
            warn!(path = %base.display(), "catalog: media directory not found");
            return Ok(Self::default());
        }

        let mut projects = BTreeMap::new();
        for name in subdirectories(base)? {
            if SKIPPED_FOLDERS.contains(&name.as_str()) {
                continue;
            }
            let project = scan_project(&base.join(&name), &name)?;
            projects.insert(name, project);
        }
        Ok(Self { projects })
    }

    #[must_use]
    pub fn project_names(&self) -> Vec<String> {
        self.projects.keys().cloned().collect()
    }

    #[must_use]
    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    #[must_use]
    pub fn thumbnails(&self) -> Vec<Thumbnail> {
        self.projects
            .iter()
            .filter_map(|(name, project)| {
                project.thumb.as_ref().map(|thumb| Thumbnail {
                    project_name: name.clone(),
                    file_name: thumb.file_name.clone(),
                    url: thumb.url.clone(),
                })
            })
            .collect()
    }

    #[must_use]
    pub fn summary(&self) -> CatalogSummary {
        let projects = self
            .projects
            .values()
            .map(|p| ProjectSummary {
                name: p.name.clone(),
                has_poster: !p.poster.is_empty(),
                has_phone: !p.phone.is_empty(),
                has_music: !p.music.is_empty(),
                has_billboard: !p.billboard.is_empty(),
                has_album: p.has_album(),
                has_thumb: p.thumb.is_some(),
                counts: MediaCounts {
                    poster: p.poster.len(),
                    phone: p.phone.len(),
                    music: p.music.len(),
                    billboard: p.billboard.len(),
                    album: p.album_count(),
                },
            })
            .collect::<Vec<_>>();
        CatalogSummary { project_count: projects.len(), projects }
    }

    /// Initial `currentSourceId`: the first project's best media type.
    ///
    /// Priority is poster, phone, billboard, then album subfolder `1`.
    #[must_use]
    pub fn default_source(&self) -> String {
        let Some(first) = self.projects.values().next() else {
            return FALLBACK_SOURCE.to_owned();
        };
        let media_type = if !first.poster.is_empty() {
            "poster"
        } else if !first.phone.is_empty() {
            "phone"
        } else if !first.billboard.is_empty() {
            "billboard"
        } else if first.has_album() {
            "album/1"
        } else {
            return FALLBACK_SOURCE.to_owned();
        };
        format!("{}/{media_type}", first.name)
    }

    /// Look up one media type of a project. `subfolder` only applies to albums.
    ///
    /// # Errors
    ///
    /// Unknown project, subfolder or empty media are [`CatalogError::ProjectNotFound`],
    /// [`CatalogError::SubfolderNotFound`] and [`CatalogError::Empty`]; a media
    /// type outside [`MEDIA_TYPES`] is [`CatalogError::InvalidMediaType`].
    pub fn media(&self, project: &str, media_type: &str, subfolder: Option<&str>) -> Result<MediaData, CatalogError> {
        let Some(p) = self.projects.get(project) else {
            return Err(CatalogError::ProjectNotFound(project.to_owned()));
        };

        let files = match media_type {
            "poster" => &p.poster,
            "phone" => &p.phone,
            "music" => &p.music,
            "billboard" => &p.billboard,
            "thumb" => {
                return p
                    .thumb
                    .clone()
                    .map(MediaData::Thumb)
                    .ok_or_else(|| CatalogError::Empty(media_type.to_owned()));
            }
            "album" => {
                let album = p.album.as_ref();
                return match subfolder {
                    Some(sub) => {
                        let files = album
                            .and_then(|a| a.get(sub))
                            .ok_or_else(|| CatalogError::SubfolderNotFound(sub.to_owned()))?;
                        non_empty(files, media_type)
                    }
                    None => match album {
                        Some(a) if !a.is_empty() => Ok(MediaData::Album(a.clone())),
                        _ => Err(CatalogError::Empty(media_type.to_owned())),
                    },
                };
            }
            other => return Err(CatalogError::InvalidMediaType(other.to_owned())),
        };
        non_empty(files, media_type)
    }

    /// Log the per-project summary, once at startup.
    pub fn log_summary(&self) {
        let summary = self.summary();
        info!(projects = summary.project_count, "catalog: media catalog loaded");
        for p in &summary.projects {
            info!(
                project = %p.name,
                poster = p.counts.poster,
                phone = p.counts.phone,
                music = p.counts.music,
                billboard = p.counts.billboard,
                album = p.counts.album,
                thumb = p.has_thumb,
                "catalog: project"
            );
        }
    }
}

// =============================================================================
// SCANNING
// =============================================================================

fn scan_project(dir: &Path, name: &str) -> Result<Project, CatalogError> {
    let url_base = format!("{URL_ROOT}/{name}");
    let thumb = dir.join(THUMB_FILE).is_file().then(|| MediaFile {
        file_name: THUMB_FILE.to_owned(),
        url: format!("{url_base}/{THUMB_FILE}"),
    });

    Ok(Project {
        name: name.to_owned(),
        poster: list_files(&dir.join("poster"), &format!("{url_base}/poster"), VISUAL_EXTENSIONS)?,
        phone: list_files(&dir.join("phone"), &format!("{url_base}/phone"), VISUAL_EXTENSIONS)?,
        music: list_files(&dir.join("music"), &format!("{url_base}/music"), MUSIC_EXTENSIONS)?,
        billboard: list_files(&dir.join("billboard"), &format!("{url_base}/billboard"), VISUAL_EXTENSIONS)?,
        album: scan_album(&dir.join("album"), &format!("{url_base}/album"))?,
        thumb,
    })
}

fn scan_album(dir: &Path, url_prefix: &str) -> Result<Option<BTreeMap<String, Vec<MediaFile>>>, CatalogError> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut album = BTreeMap::new();
    for folder in subdirectories(dir)? {
        let files = list_files(&dir.join(&folder), &format!("{url_prefix}/{folder}"), VISUAL_EXTENSIONS)?;
        album.insert(folder, files);
    }
    Ok(Some(album))
}

/// Files in `dir` with one of `extensions`, sorted by name. Missing dir → empty.
fn list_files(dir: &Path, url_prefix: &str, extensions: &[&str]) -> Result<Vec<MediaFile>, CatalogError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let wanted = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.contains(&e));
        if wanted && path.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names
        .into_iter()
        .map(|file_name| MediaFile { url: format!("{url_prefix}/{file_name}"), file_name })
        .collect())
}

fn subdirectories(dir: &Path) -> Result<Vec<String>, CatalogError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn non_empty(files: &[MediaFile], media_type: &str) -> Result<MediaData, CatalogError> {
    if files.is_empty() {
        return Err(CatalogError::Empty(media_type.to_owned()));
    }
    Ok(MediaData::Files(files.to_vec()))
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
