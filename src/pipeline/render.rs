//! PDF rasterisation: one image file per page, written in page order.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated thread pool
//! thread designed for blocking operations, preventing the Tokio worker
//! threads from stalling during CPU-heavy rendering.
//!
//! ## Bounded memory
//!
//! Pages are rendered strictly one after another. Each page's bitmap, image
//! and encoded buffer are dropped at the end of its loop iteration, so peak
//! memory is one page regardless of deck length.
//!
//! ## Partial output
//!
//! Options are validated and the document is opened before anything is
//! written. A failure on page *k* after that leaves pages `1..k` on disk:
//! the rasterizer does not roll back, and callers treat a failed output
//! directory as invalid.

use crate::config::RenderOptions;
use crate::error::SlidefError;
use crate::output::page_file_name;
use crate::pipeline::encode;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A source of page rasters.
///
/// [`PdfiumEngine`] is the production implementation; the seam exists so
/// the write path can be exercised without a pdfium library. The document
/// is lent to `visit` rather than returned because pdfium documents borrow
/// their library binding, which lives only for the duration of the call.
pub trait RasterEngine: Send + Sync {
    /// Parse `bytes` as a document and run `visit` over it.
    fn with_document(
        &self,
        bytes: Vec<u8>,
        visit: &mut dyn FnMut(&dyn RasterDocument) -> Result<usize, SlidefError>,
    ) -> Result<usize, SlidefError>;
}

/// An open document.
pub trait RasterDocument {
    fn page_count(&self) -> usize;

    /// Rasterise the page at 0-based `index`, scaling its intrinsic size by `scale`.
    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage, String>;
}

/// Renders documents into numbered page images.
#[derive(Clone)]
pub struct Rasterizer {
    engine: Arc<dyn RasterEngine>,
}

impl Rasterizer {
    pub fn new(engine: Arc<dyn RasterEngine>) -> Self {
        Self { engine }
    }

    /// A rasterizer backed by pdfium, failing early if no library can be bound.
    pub fn pdfium() -> Result<Self, SlidefError> {
        Ok(Self::new(Arc::new(PdfiumEngine::probe()?)))
    }

    /// Render every page of `source` into `output_dir` as
    /// `page-001.<ext>`, `page-002.<ext>`, … and return the page count.
    ///
    /// # Errors
    /// - [`SlidefError::Validation`] for bad options; nothing is written.
    /// - [`SlidefError::DocumentParse`] when `source` is not a PDF; nothing is written.
    /// - [`SlidefError::PageRender`] when a page fails; earlier pages stay on disk.
    pub async fn render(
        &self,
        source: Vec<u8>,
        output_dir: &Path,
        options: &RenderOptions,
    ) -> Result<usize, SlidefError> {
        options.validate()?;

        let engine = Arc::clone(&self.engine);
        let dir = output_dir.to_path_buf();
        let options = options.clone();

        tokio::task::spawn_blocking(move || render_blocking(engine.as_ref(), source, &dir, &options))
            .await
            .map_err(|e| SlidefError::Internal(format!("Render task panicked: {}", e)))?
    }
}

/// Blocking implementation of page rendering.
fn render_blocking(
    engine: &dyn RasterEngine,
    source: Vec<u8>,
    output_dir: &Path,
    options: &RenderOptions,
) -> Result<usize, SlidefError> {
    engine.with_document(source, &mut |document: &dyn RasterDocument| {
        render_document(document, output_dir, options)
    })
}

fn render_document(
    document: &dyn RasterDocument,
    output_dir: &Path,
    options: &RenderOptions,
) -> Result<usize, SlidefError> {
    let total_pages = document.page_count();
    if total_pages == 0 {
        return Err(SlidefError::DocumentParse {
            detail: "document has no pages".into(),
        });
    }
    info!("Document loaded: {} pages", total_pages);

    std::fs::create_dir_all(output_dir).map_err(|e| SlidefError::io(output_dir, e))?;

    let callback = options.progress_callback.as_deref();
    if let Some(cb) = callback {
        cb.on_render_start(total_pages);
    }

    for idx in 0..total_pages {
        let page_num = idx + 1;
        match render_one(document, idx, output_dir, options) {
            Ok((path, bytes)) => {
                debug!("Wrote page {} → {} ({} bytes)", page_num, path.display(), bytes);
                if let Some(cb) = callback {
                    cb.on_page_rendered(page_num, total_pages, bytes);
                }
            }
            Err(e) => {
                if let Some(cb) = callback {
                    cb.on_page_error(page_num, total_pages, e.to_string());
                }
                return Err(e);
            }
        }
    }

    if let Some(cb) = callback {
        cb.on_render_complete(total_pages);
    }
    Ok(total_pages)
}

/// Render, encode and write a single page. Every buffer is dropped on return.
fn render_one(
    document: &dyn RasterDocument,
    idx: usize,
    output_dir: &Path,
    options: &RenderOptions,
) -> Result<(PathBuf, usize), SlidefError> {
    let page_num = idx + 1;

    let image = document
        .render_page(idx, options.scale)
        .map_err(|detail| SlidefError::PageRender {
            page: page_num,
            detail,
        })?;
    debug!(
        "Rendered page {} → {}x{} px",
        page_num,
        image.width(),
        image.height()
    );

    let encoded = encode::encode_page(&image, options.format, options.encoder_quality())
        .map_err(|detail| SlidefError::PageRender {
            page: page_num,
            detail,
        })?;
    drop(image);

    let path = output_dir.join(page_file_name(page_num, options.format));
    std::fs::write(&path, &encoded).map_err(|e| SlidefError::PageRender {
        page: page_num,
        detail: format!("writing {}: {}", path.display(), e),
    })?;

    Ok((path, encoded.len()))
}

// ── pdfium engine ────────────────────────────────────────────────────────

/// Bind to a pdfium library.
///
/// Resolution order:
/// 1. `PDFIUM_LIB_PATH` (a file path, or a directory containing the library)
/// 2. the platform library name in the current directory
/// 3. the system library search path
pub fn bind_pdfium() -> Result<Pdfium, SlidefError> {
    if let Ok(path) = std::env::var("PDFIUM_LIB_PATH") {
        let path = PathBuf::from(path);
        let lib = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            path
        };
        return Pdfium::bind_to_library(&lib)
            .map(Pdfium::new)
            .map_err(|e| SlidefError::PdfiumBindingFailed(format!("{}: {:?}", lib.display(), e)));
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| SlidefError::PdfiumBindingFailed(format!("{:?}", e)))
}

/// [`RasterEngine`] backed by pdfium.
///
/// The library is bound on the blocking thread for each document, the same
/// way a fresh `Pdfium` is created per render call, so the engine itself
/// holds no pdfium state.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumEngine;

impl PdfiumEngine {
    /// Check that a pdfium library can be bound, so a missing library is
    /// reported at startup rather than on the first import.
    pub fn probe() -> Result<Self, SlidefError> {
        bind_pdfium()?;
        Ok(Self)
    }
}

impl RasterEngine for PdfiumEngine {
    fn with_document(
        &self,
        bytes: Vec<u8>,
        visit: &mut dyn FnMut(&dyn RasterDocument) -> Result<usize, SlidefError>,
    ) -> Result<usize, SlidefError> {
        if !bytes.starts_with(b"%PDF") {
            return Err(SlidefError::DocumentParse {
                detail: "missing %PDF header".into(),
            });
        }

        let pdfium = bind_pdfium()?;
        let document =
            pdfium
                .load_pdf_from_byte_vec(bytes, None)
                .map_err(|e| SlidefError::DocumentParse {
                    detail: format!("{:?}", e),
                })?;

        let doc = PdfiumDocument { document };
        let result = visit(&doc);
        result
    }
}

struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl RasterDocument for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage, String> {
        let page = self
            .document
            .pages()
            .get(index as u16)
            .map_err(|e| format!("{:?}", e))?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| format!("{:?}", e))?;

        Ok(bitmap.as_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageFormat;
    use image::{Rgba, RgbaImage};

    /// Pages are solid rectangles of 40×30 points.
    struct FakeEngine {
        pages: usize,
        fail_at: Option<usize>,
    }

    struct FakeDocument {
        pages: usize,
        fail_at: Option<usize>,
    }

    impl RasterEngine for FakeEngine {
        fn with_document(
            &self,
            bytes: Vec<u8>,
            visit: &mut dyn FnMut(&dyn RasterDocument) -> Result<usize, SlidefError>,
        ) -> Result<usize, SlidefError> {
            if !bytes.starts_with(b"%PDF") {
                return Err(SlidefError::DocumentParse {
                    detail: "missing %PDF header".into(),
                });
            }
            visit(&FakeDocument {
                pages: self.pages,
                fail_at: self.fail_at,
            })
        }
    }

    impl RasterDocument for FakeDocument {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn render_page(&self, index: usize, scale: f32) -> Result<DynamicImage, String> {
            if self.fail_at == Some(index) {
                return Err("simulated render failure".into());
            }
            let w = (40.0 * scale).round() as u32;
            let h = (30.0 * scale).round() as u32;
            Ok(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                w,
                h,
                Rgba([200, 10, 10, 255]),
            )))
        }
    }

    fn rasterizer(pages: usize, fail_at: Option<usize>) -> Rasterizer {
        Rasterizer::new(Arc::new(FakeEngine { pages, fail_at }))
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }

    #[tokio::test]
    async fn three_pages_png() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("images");
        let options = RenderOptions::builder()
            .scale(2.0)
            .format(ImageFormat::Png)
            .build()
            .unwrap();

        let count = rasterizer(3, None)
            .render(b"%PDF-1.7".to_vec(), &out, &options)
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(
            files_in(&out),
            ["page-001.png", "page-002.png", "page-003.png"]
        );
    }

    #[tokio::test]
    async fn scale_multiplies_pixel_dimensions() {
        let tmp = tempfile::tempdir().unwrap();
        for (scale, sub) in [(1.0, "x1"), (3.0, "x3")] {
            let options = RenderOptions::builder()
                .scale(scale)
                .format(ImageFormat::Png)
                .build()
                .unwrap();
            rasterizer(1, None)
                .render(b"%PDF".to_vec(), &tmp.path().join(sub), &options)
                .await
                .unwrap();
        }
        let small = image::image_dimensions(tmp.path().join("x1/page-001.png")).unwrap();
        let large = image::image_dimensions(tmp.path().join("x3/page-001.png")).unwrap();
        assert_eq!(small, (40, 30));
        assert_eq!(large, (120, 90));
    }

    #[tokio::test]
    async fn jpeg_uses_jpg_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let options = RenderOptions::builder()
            .format(ImageFormat::Jpeg)
            .quality(60)
            .build()
            .unwrap();
        rasterizer(2, None)
            .render(b"%PDF".to_vec(), tmp.path(), &options)
            .await
            .unwrap();
        assert_eq!(files_in(tmp.path()), ["page-001.jpg", "page-002.jpg"]);
    }

    #[tokio::test]
    async fn invalid_options_write_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("images");

        for options in [
            RenderOptions {
                scale: 0.0,
                ..Default::default()
            },
            RenderOptions {
                scale: -2.0,
                ..Default::default()
            },
            RenderOptions {
                quality: 101,
                ..Default::default()
            },
            RenderOptions {
                quality: -5,
                ..Default::default()
            },
        ] {
            let err = rasterizer(3, None)
                .render(b"%PDF".to_vec(), &out, &options)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Validation);
        }
        assert!(!out.exists(), "validation must precede any write");
    }

    #[tokio::test]
    async fn unparseable_source_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("images");
        let err = rasterizer(3, None)
            .render(b"not a pdf".to_vec(), &out, &RenderOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SlidefError::DocumentParse { .. }));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn empty_document_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("images");
        let err = rasterizer(0, None)
            .render(b"%PDF".to_vec(), &out, &RenderOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::DocumentParse);
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn unencodable_page_is_a_page_error() {
        // Wider than the WebP encoder accepts.
        struct Banner;
        impl RasterEngine for Banner {
            fn with_document(
                &self,
                _bytes: Vec<u8>,
                visit: &mut dyn FnMut(&dyn RasterDocument) -> Result<usize, SlidefError>,
            ) -> Result<usize, SlidefError> {
                visit(self)
            }
        }
        impl RasterDocument for Banner {
            fn page_count(&self) -> usize {
                1
            }
            fn render_page(&self, _index: usize, _scale: f32) -> Result<DynamicImage, String> {
                Ok(DynamicImage::ImageRgba8(RgbaImage::new(17_000, 2)))
            }
        }

        let tmp = tempfile::tempdir().unwrap();
        let err = Rasterizer::new(Arc::new(Banner))
            .render(b"%PDF".to_vec(), tmp.path(), &RenderOptions::default())
            .await
            .unwrap_err();
        match err {
            SlidefError::PageRender { page, .. } => assert_eq!(page, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn mid_document_failure_keeps_earlier_pages() {
        let tmp = tempfile::tempdir().unwrap();
        let options = RenderOptions::builder()
            .format(ImageFormat::Png)
            .build()
            .unwrap();
        let err = rasterizer(4, Some(2))
            .render(b"%PDF".to_vec(), tmp.path(), &options)
            .await
            .unwrap_err();

        match err {
            SlidefError::PageRender { page, .. } => assert_eq!(page, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(files_in(tmp.path()), ["page-001.png", "page-002.png"]);
    }

    #[tokio::test]
    async fn progress_events_follow_page_order() {
        use crate::progress::RenderProgressCallback;
        use std::sync::Mutex;

        #[derive(Default)]
        struct Recorder(Mutex<Vec<String>>);

        impl RenderProgressCallback for Recorder {
            fn on_render_start(&self, total: usize) {
                self.0.lock().unwrap().push(format!("start {total}"));
            }
            fn on_page_rendered(&self, page: usize, total: usize, _bytes: usize) {
                self.0.lock().unwrap().push(format!("page {page}/{total}"));
            }
            fn on_render_complete(&self, total: usize) {
                self.0.lock().unwrap().push(format!("done {total}"));
            }
        }

        let recorder = Arc::new(Recorder::default());
        let options = RenderOptions::builder()
            .format(ImageFormat::Png)
            .progress_callback(recorder.clone())
            .build()
            .unwrap();
        let tmp = tempfile::tempdir().unwrap();
        rasterizer(2, None)
            .render(b"%PDF".to_vec(), tmp.path(), &options)
            .await
            .unwrap();

        assert_eq!(
            *recorder.0.lock().unwrap(),
            ["start 2", "page 1/2", "page 2/2", "done 2"]
        );
    }
}
