//! Pipeline stages for turning a PDF into a slide deck.
//!
//! Each submodule implements exactly one step. Keeping stages separate makes
//! each independently testable and lets the rendering backend be swapped
//! (see [`render::RasterEngine`]) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ hash ──▶ slug ──▶ render ──▶ encode ──▶ page-NNN.<ext>
//!          (sha256) (unique)  (pdfium)  (png/jpg/webp)
//! ```
//!
//! 1. [`hash`]   — SHA-256 fingerprint of the source, recorded in metadata
//! 2. [`slug`]   — collision-free directory name from the desired base name
//! 3. [`render`] — rasterise pages in order; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 4. [`encode`] — encode each page in the requested format before it is
//!    written and dropped

pub mod encode;
pub mod hash;
pub mod render;
pub mod slug;
