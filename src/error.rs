//! Error types for the slidef library.
//!
//! Every fallible operation returns [`SlidefError`]. Callers that need to
//! branch on the failure (an HTTP layer mapping to status codes, a CLI
//! choosing an exit message) should match on [`SlidefError::kind`] rather
//! than on individual variants: the kind set is small and stable, the
//! variants carry whatever context is useful for the human-readable message.
//!
//! Failures are always scoped to the operation that produced them. Nothing
//! in the library panics or aborts the host process on a bad input file,
//! a missing artifact, or a dead live-reload subscriber.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the slidef library.
#[derive(Debug, Error)]
pub enum SlidefError {
    // ── Lookup errors ─────────────────────────────────────────────────────
    /// A slide deck, source file, or config file does not exist.
    #[error("{what} not found: '{name}'")]
    NotFound { what: &'static str, name: String },

    // ── Input validation ──────────────────────────────────────────────────
    /// Out-of-range render options, an unsafe slug, or malformed config.
    ///
    /// Always reported before any file is written.
    #[error("Invalid input: {0}")]
    Validation(String),

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The source bytes could not be opened as a PDF document.
    #[error("Source is not a readable PDF document: {detail}")]
    DocumentParse { detail: String },

    /// Rendering or encoding failed part-way through the document.
    ///
    /// Pages before `page` are left on disk; the caller decides whether the
    /// output directory is kept for inspection or removed.
    #[error("Rendering failed for page {page}: {detail}")]
    PageRender { page: usize, detail: String },

    // ── Filesystem errors ─────────────────────────────────────────────────
    /// A filesystem read or write failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A metadata record exists but is not valid JSON for its schema.
    #[error("Metadata record '{path}' is unreadable: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Two artifacts would share an identifier.
    ///
    /// Slug allocation makes this unreachable for callers that serialise
    /// imports per store.
    #[error("A slide deck named '{name}' already exists")]
    DuplicateName { name: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
executable, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (a panicked blocking task, for instance).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Machine-distinguishable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    DocumentParse,
    PageRender,
    Io,
    DuplicateName,
    Internal,
}

impl SlidefError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SlidefError::NotFound { .. } => ErrorKind::NotFound,
            SlidefError::Validation(_) => ErrorKind::Validation,
            SlidefError::DocumentParse { .. } => ErrorKind::DocumentParse,
            SlidefError::PageRender { .. } => ErrorKind::PageRender,
            SlidefError::Io { .. } | SlidefError::Metadata { .. } => ErrorKind::Io,
            SlidefError::DuplicateName { .. } => ErrorKind::DuplicateName,
            SlidefError::PdfiumBindingFailed(_) | SlidefError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for wrapping an [`std::io::Error`] with the path it concerns.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SlidefError::Io {
            path: path.into(),
            source,
        }
    }
}
