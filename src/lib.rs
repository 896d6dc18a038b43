//! # slidef
//!
//! Convert PDF slide decks into browsable static image sequences.
//!
//! ## Why images?
//!
//! A browser can show a PDF, but not as a fast, swipeable deck with stable
//! per-slide URLs. This crate rasterises every page once at import time,
//! stores the images under a collision-free slug, and publishes an index a
//! static viewer can read without any server-side code.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Hash     SHA-256 of the source (identity, not security)
//!  ├─ 2. Slug     unique directory name: my-talk, my-talk-2, …
//!  ├─ 3. Render   rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 4. Encode   png / jpeg / webp, one file per page
//!  ├─ 5. Commit   metadata.json, written only after every page exists
//!  └─ 6. Publish  slides-index.json rebuilt from a full store scan
//! ```
//!
//! During development, [`live_reload`] watches the store and config and
//! pushes reload events to connected viewers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use slidef::{publish, ArtifactStore, ImportOptions, ProjectConfig, Rasterizer};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let root = Path::new(".");
//!     let config = ProjectConfig::load(root).await?;
//!     let store = ArtifactStore::new(config.slides_path(root), Rasterizer::pdfium()?);
//!
//!     let deck = store
//!         .import_file(Path::new("talk.pdf"), ImportOptions::default())
//!         .await?;
//!     println!("{}: {} pages", deck.name, deck.page_count);
//!
//!     publish::publish(&store, &config, &config.publish_path(root)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `slidef` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! slidef = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod live_reload;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod publish;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ImageFormat, ProjectConfig, RenderOptions, RenderOptionsBuilder, ThemeConfig,
    CONFIG_FILE_NAME,
};
pub use error::{ErrorKind, SlidefError};
pub use output::{MetadataPatch, SlideIndex, SlideMetadata};
pub use pipeline::render::{PdfiumEngine, RasterDocument, RasterEngine, Rasterizer};
pub use progress::{NoopProgressCallback, ProgressCallback, RenderProgressCallback};
pub use publish::{build_index, PublishReport};
pub use store::{ArtifactStore, ImportOptions};
