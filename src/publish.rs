//! Index building and static publishing.
//!
//! The index is always rebuilt from a full [`ArtifactStore::list_all`] scan
//! and never patched, so a removed deck cannot linger in it.
//!
//! ```text
//! <output>/
//!   slides-index.json
//!   theme.css              (only when a theme is configured)
//!   slides/
//!     my-talk/metadata.json
//!     my-talk/images/page-001.webp
//! ```

use crate::config::ProjectConfig;
use crate::error::SlidefError;
use crate::output::{SlideIndex, SlideMetadata};
use crate::store::{self, ArtifactStore};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Index file name at the root of a published site.
pub const INDEX_FILE: &str = "slides-index.json";

/// Theme override stylesheet at the root of a published site.
pub const THEME_CSS_FILE: &str = "theme.css";

/// Subdirectory of the site holding the deck directories.
pub const SLIDES_SUBDIR: &str = "slides";

/// Wrap a full metadata snapshot with a fresh timestamp.
pub fn build_index(slides: Vec<SlideMetadata>) -> SlideIndex {
    SlideIndex {
        slides,
        updated_at: Utc::now(),
    }
}

/// Write `index` as `<output_dir>/slides-index.json`.
pub async fn write_index(index: &SlideIndex, output_dir: &Path) -> Result<PathBuf, SlidefError> {
    let path = output_dir.join(INDEX_FILE);
    let json =
        serde_json::to_string_pretty(index).map_err(|e| SlidefError::Internal(e.to_string()))?;
    store::write_atomic(&path, json.as_bytes()).await?;
    Ok(path)
}

/// Outcome of a [`publish`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub index_path: PathBuf,
    /// Decks listed in the index.
    pub slide_count: usize,
    /// Deck directories copied into the site. Zero when the store already
    /// lives at `<output>/slides`.
    pub copied: usize,
    /// Site deck directories removed because their deck is gone.
    pub pruned: Vec<String>,
    pub theme_css: Option<PathBuf>,
}

/// Publish every deck in `store` into `output_dir`.
pub async fn publish(
    store: &ArtifactStore,
    config: &ProjectConfig,
    output_dir: &Path,
) -> Result<PublishReport, SlidefError> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| SlidefError::io(output_dir, e))?;

    let slides = store.list_all().await?;
    let names: Vec<String> = slides.iter().map(|m| m.name.clone()).collect();
    let index = build_index(slides);
    let index_path = write_index(&index, output_dir).await?;
    info!("Wrote {} ({} decks)", index_path.display(), names.len());

    let site_slides = output_dir.join(SLIDES_SUBDIR);
    let (copied, pruned) = if same_dir(store.root(), &site_slides).await {
        debug!("Store already at {}, nothing to copy", site_slides.display());
        (0, Vec::new())
    } else {
        for name in &names {
            copy_slide(&store.slide_dir(name), &site_slides.join(name)).await?;
        }
        let pruned = prune_stale(&site_slides, &names).await?;
        (names.len(), pruned)
    };

    let theme_css = match &config.theme {
        Some(theme) => {
            let path = output_dir.join(THEME_CSS_FILE);
            store::write_atomic(&path, theme.to_css().as_bytes()).await?;
            Some(path)
        }
        None => None,
    };

    Ok(PublishReport {
        index_path,
        slide_count: names.len(),
        copied,
        pruned,
        theme_css,
    })
}

/// Remove deck directories under `site_slides` that are not in `keep`.
async fn prune_stale(site_slides: &Path, keep: &[String]) -> Result<Vec<String>, SlidefError> {
    let mut entries = match tokio::fs::read_dir(site_slides).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SlidefError::io(site_slides, e)),
    };

    let mut pruned = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SlidefError::io(site_slides, e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir || name.starts_with('.') || keep.contains(&name) {
            continue;
        }
        tokio::fs::remove_dir_all(entry.path())
            .await
            .map_err(|e| SlidefError::io(entry.path(), e))?;
        info!("Removed stale deck {} from site", name);
        pruned.push(name);
    }
    pruned.sort();
    Ok(pruned)
}

async fn same_dir(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Replace `dst` with a copy of `src`. Pages left over from an earlier,
/// longer import of the same slug must not survive.
async fn copy_slide(src: &Path, dst: &Path) -> Result<(), SlidefError> {
    match tokio::fs::remove_dir_all(dst).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(SlidefError::io(dst, e)),
    }

    let (src, dst) = (src.to_path_buf(), dst.to_path_buf());
    tokio::task::spawn_blocking(move || {
        copy_dir_recursive(&src, &dst).map_err(|e| SlidefError::io(&src, e))
    })
    .await
    .map_err(|e| SlidefError::Internal(format!("Copy task panicked: {}", e)))?
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else if !entry.file_name().to_string_lossy().starts_with('.') {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}
