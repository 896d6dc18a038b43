//! The artifact store: one directory per slide deck.
//!
//! ```text
//! <root>/
//!   my-talk/
//!     metadata.json
//!     images/
//!       page-001.webp
//!       page-002.webp
//! ```
//!
//! ## Commit order
//!
//! [`ArtifactStore::create`] writes every page image before it writes
//! `metadata.json`, and the record is written via temp file + rename. A
//! directory therefore only becomes visible to [`ArtifactStore::list_all`]
//! once its images are complete. A failed import leaves a directory without
//! a record; it is skipped by listings but still occupies its slug until
//! removed.
//!
//! ## Concurrent imports
//!
//! Slug allocation reads the directory names on disk and then renders into
//! the chosen one. The two steps are not atomic, so callers that may import
//! concurrently must serialise imports per store root.

use crate::config::RenderOptions;
use crate::error::SlidefError;
use crate::output::{MetadataPatch, SlideMetadata};
use crate::pipeline::render::Rasterizer;
use crate::pipeline::{hash, slug};
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the per-deck metadata record.
pub const METADATA_FILE: &str = "metadata.json";

/// Name of the per-deck image directory.
pub const IMAGES_DIR: &str = "images";

static RE_PAGE_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^page-(\d{3,})\.(png|jpg|webp)$").unwrap());

/// Per-import settings.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Base name for the slug. [`ArtifactStore::import_file`] falls back to
    /// the file stem.
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Import date to record. Default: today (UTC).
    pub created_at: Option<NaiveDate>,
    pub render: RenderOptions,
}

/// Filesystem-backed collection of converted slide decks.
#[derive(Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    rasterizer: Rasterizer,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, rasterizer: Rasterizer) -> Self {
        Self {
            root: root.into(),
            rasterizer,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of the deck `slug`. Does not check that it exists.
    pub fn slide_dir(&self, slug: &str) -> PathBuf {
        self.root.join(slug)
    }

    pub fn images_dir(&self, slug: &str) -> PathBuf {
        self.slide_dir(slug).join(IMAGES_DIR)
    }

    fn metadata_path(&self, slug: &str) -> PathBuf {
        self.slide_dir(slug).join(METADATA_FILE)
    }

    /// Convert `source` into a new deck and return its metadata record.
    ///
    /// The slug is allocated from `options.name` against every directory
    /// currently under the root, including ones without a record.
    ///
    /// # Errors
    /// - [`SlidefError::Validation`] for bad render options; nothing is written.
    /// - [`SlidefError::DocumentParse`] if `source` is not a PDF; nothing is written.
    /// - [`SlidefError::PageRender`] if a page fails. Earlier pages remain in
    ///   `<slug>/images` and no record is written.
    pub async fn create(
        &self,
        source: Vec<u8>,
        options: &ImportOptions,
    ) -> Result<SlideMetadata, SlidefError> {
        options.render.validate()?;

        let digest = hash::hash_bytes(&source);
        let existing = self.existing_slugs().await?;
        let base_name = options.name.as_deref().unwrap_or_default();
        let name = slug::allocate(base_name, &existing);
        if existing.contains(&name) {
            return Err(SlidefError::DuplicateName { name });
        }
        info!("Importing '{}' as {}", base_name, name);

        let images_dir = self.images_dir(&name);
        let page_count = self
            .rasterizer
            .render(source, &images_dir, &options.render)
            .await?;

        let written = self.image_paths(&name).await?.len();
        if written != page_count {
            return Err(SlidefError::Internal(format!(
                "{}: rendered {} pages but found {} images",
                name, page_count, written
            )));
        }

        let metadata = SlideMetadata {
            name: name.clone(),
            title: options.title.clone(),
            page_count,
            created_at: options
                .created_at
                .unwrap_or_else(|| Utc::now().date_naive()),
            sha256: digest,
            description: options.description.clone(),
            format: Some(options.render.format),
            extra: Default::default(),
        };
        self.write_metadata(&metadata).await?;

        info!("Imported {} ({} pages)", name, page_count);
        Ok(metadata)
    }

    /// Read a PDF from disk and [`create`](Self::create) a deck from it.
    ///
    /// The base name defaults to the file stem and the title to the base name.
    pub async fn import_file(
        &self,
        path: &Path,
        options: ImportOptions,
    ) -> Result<SlideMetadata, SlidefError> {
        let source = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SlidefError::NotFound {
                    what: "source file",
                    name: path.display().to_string(),
                });
            }
            Err(e) => return Err(SlidefError::io(path, e)),
        };

        let base_name = options.name.clone().unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        let options = ImportOptions {
            title: options.title.clone().or_else(|| Some(base_name.clone())),
            name: Some(base_name),
            ..options
        };
        self.create(source, &options).await
    }

    /// Metadata record of `slug`.
    pub async fn get(&self, slug: &str) -> Result<SlideMetadata, SlidefError> {
        ensure_safe(slug)?;
        let path = self.metadata_path(slug);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(not_found(slug));
            }
            Err(e) => return Err(SlidefError::io(path, e)),
        };
        serde_json::from_str(&text).map_err(|source| SlidefError::Metadata { path, source })
    }

    /// Apply `patch` to the record of `slug` and rewrite it.
    pub async fn update(
        &self,
        slug: &str,
        patch: MetadataPatch,
    ) -> Result<SlideMetadata, SlidefError> {
        let mut metadata = self.get(slug).await?;
        if patch.is_empty() {
            return Ok(metadata);
        }
        metadata.apply(patch);
        self.write_metadata(&metadata).await?;
        debug!("Updated metadata of {}", slug);
        Ok(metadata)
    }

    /// Delete the deck `slug` and everything under it.
    ///
    /// Removing a slug that does not exist succeeds and changes nothing.
    pub async fn remove(&self, slug: &str) -> Result<(), SlidefError> {
        ensure_safe(slug)?;
        let dir = self.slide_dir(slug);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!("Removed {}", slug);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Nothing to remove for {}", slug);
                Ok(())
            }
            Err(e) => Err(SlidefError::io(dir, e)),
        }
    }

    /// Every deck with a readable record, sorted by slug.
    ///
    /// Directories without a parseable `metadata.json` are skipped. A
    /// missing store root yields an empty list.
    pub async fn list_all(&self) -> Result<Vec<SlideMetadata>, SlidefError> {
        let mut slides = Vec::new();
        for name in self.subdirectories().await? {
            let path = self.metadata_path(&name);
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) => {
                    debug!("Skipping {}: {}", name, e);
                    continue;
                }
            };
            match serde_json::from_str::<SlideMetadata>(&text) {
                Ok(metadata) => slides.push(metadata),
                Err(e) => warn!("Skipping {}: unreadable {}: {}", name, METADATA_FILE, e),
            }
        }
        slides.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(slides)
    }

    /// Page images of `slug` in page order.
    pub async fn image_paths(&self, slug: &str) -> Result<Vec<PathBuf>, SlidefError> {
        ensure_safe(slug)?;
        let dir = self.images_dir(slug);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(not_found(slug));
            }
            Err(e) => return Err(SlidefError::io(dir, e)),
        };

        let mut pages: Vec<(u64, PathBuf)> = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SlidefError::io(&dir, e))?
        {
            let file_name = entry.file_name();
            let Some(caps) = file_name.to_str().and_then(|n| RE_PAGE_FILE.captures(n)) else {
                continue;
            };
            if let Ok(n) = caps[1].parse::<u64>() {
                pages.push((n, entry.path()));
            }
        }
        pages.sort_by_key(|(n, _)| *n);
        Ok(pages.into_iter().map(|(_, path)| path).collect())
    }

    /// Names of every non-hidden subdirectory of the root.
    async fn subdirectories(&self) -> Result<Vec<String>, SlidefError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SlidefError::io(&self.root, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SlidefError::io(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_dir && !name.starts_with('.') {
                names.push(name);
            }
        }
        Ok(names)
    }

    async fn existing_slugs(&self) -> Result<HashSet<String>, SlidefError> {
        Ok(self.subdirectories().await?.into_iter().collect())
    }

    async fn write_metadata(&self, metadata: &SlideMetadata) -> Result<(), SlidefError> {
        let json = serde_json::to_string_pretty(metadata)
            .map_err(|e| SlidefError::Internal(e.to_string()))?;
        write_atomic(&self.metadata_path(&metadata.name), json.as_bytes()).await
    }
}

fn ensure_safe(slug: &str) -> Result<(), SlidefError> {
    if slug::is_safe(slug) {
        Ok(())
    } else {
        Err(SlidefError::Validation(format!("invalid slide name '{slug}'")))
    }
}

fn not_found(slug: &str) -> SlidefError {
    SlidefError::NotFound {
        what: "slide deck",
        name: slug.to_string(),
    }
}

/// Write `bytes` to `path` via a hidden sibling temp file and a rename,
/// creating parent directories as needed. Readers never observe a
/// half-written file.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SlidefError> {
    let path = path.to_path_buf();
    let bytes = bytes.to_vec();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &bytes))
        .await
        .map_err(|e| SlidefError::Internal(format!("Write task panicked: {}", e)))?
}

fn write_atomic_blocking(path: &Path, bytes: &[u8]) -> Result<(), SlidefError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| SlidefError::io(parent, e))?;

    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| SlidefError::io(parent, e))?;
    tmp.write_all(bytes)
        .map_err(|e| SlidefError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| SlidefError::io(path, e.error))?;
    Ok(())
}
