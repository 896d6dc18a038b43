//! Configuration types: render options and the project config file.
//!
//! Two distinct kinds of configuration live here:
//!
//! * [`RenderOptions`] — per-import knobs for the rasterizer (scale, image
//!   format, lossy quality). Built via [`RenderOptions::builder()`] and
//!   validated before any file is touched.
//! * [`ProjectConfig`] — the `slidef.config.json` file at a project root:
//!   site title, directories, theme. Unknown keys survive a load/save cycle
//!   so hand-edited extras are never silently dropped.

use crate::error::SlidefError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File name of the project config, relative to the project root.
pub const CONFIG_FILE_NAME: &str = "slidef.config.json";

// ── Render options ───────────────────────────────────────────────────────

/// Options for rasterizing one document.
///
/// # Example
/// ```rust
/// use slidef::{ImageFormat, RenderOptions};
///
/// let options = RenderOptions::builder()
///     .scale(1.5)
///     .format(ImageFormat::Jpeg)
///     .quality(70)
///     .build()
///     .unwrap();
/// assert_eq!(options.format.extension(), "jpg");
/// ```
#[derive(Clone)]
pub struct RenderOptions {
    /// Linear multiplier on each page's intrinsic size. Must be > 0. Default: 2.0.
    ///
    /// PDF pages are measured in points (1/72 in), so scale 1.0 gives a 72 DPI
    /// raster and the default 2.0 gives 144 DPI: crisp on high-density screens
    /// without multi-megabyte slides.
    pub scale: f32,

    /// Output encoding. Default: [`ImageFormat::Webp`].
    pub format: ImageFormat,

    /// Lossy encoder quality, 0–100. Default: 85. Ignored for PNG.
    ///
    /// Kept signed so out-of-range input (negative values from a CLI or a
    /// JSON request) is reported instead of wrapping.
    pub quality: i64,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scale: 2.0,
            format: ImageFormat::default(),
            quality: 85,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RenderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderOptions")
            .field("scale", &self.scale)
            .field("format", &self.format)
            .field("quality", &self.quality)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn RenderProgressCallback>"),
            )
            .finish()
    }
}

impl RenderOptions {
    /// Create a new builder for `RenderOptions`.
    pub fn builder() -> RenderOptionsBuilder {
        RenderOptionsBuilder {
            options: Self::default(),
        }
    }

    /// Check the numeric contract: scale finite and > 0, quality in 0–100.
    ///
    /// Quality is checked for every format so a bad value is caught even
    /// when it would be ignored.
    pub fn validate(&self) -> Result<(), SlidefError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(SlidefError::Validation(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        if !(0..=100).contains(&self.quality) {
            return Err(SlidefError::Validation(format!(
                "quality must be between 0 and 100, got {}",
                self.quality
            )));
        }
        Ok(())
    }

    /// Quality as the encoder expects it. Only meaningful after [`validate`](Self::validate).
    pub(crate) fn encoder_quality(&self) -> u8 {
        self.quality.clamp(0, 100) as u8
    }
}

/// Builder for [`RenderOptions`].
#[derive(Debug)]
pub struct RenderOptionsBuilder {
    options: RenderOptions,
}

impl RenderOptionsBuilder {
    pub fn scale(mut self, scale: f32) -> Self {
        self.options.scale = scale;
        self
    }

    pub fn format(mut self, format: ImageFormat) -> Self {
        self.options.format = format;
        self
    }

    pub fn quality(mut self, quality: i64) -> Self {
        self.options.quality = quality;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.options.progress_callback = Some(cb);
        self
    }

    /// Build the options, validating constraints.
    pub fn build(self) -> Result<RenderOptions, SlidefError> {
        self.options.validate()?;
        Ok(self.options)
    }
}

/// Encoding of rendered page images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Lossless.
    Png,
    /// Lossy; written with the `.jpg` extension.
    Jpeg,
    /// Lossy WebP. (default)
    #[default]
    Webp,
}

impl ImageFormat {
    /// File extension for page images, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Webp => "webp",
        }
    }

    /// Whether the encoder honours [`RenderOptions::quality`].
    pub fn is_lossy(self) -> bool {
        !matches!(self, ImageFormat::Png)
    }

    /// Format name as used in config files and metadata records.
    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = SlidefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "webp" => Ok(ImageFormat::Webp),
            other => Err(SlidefError::Validation(format!(
                "format must be png, jpeg, or webp, got '{other}'"
            ))),
        }
    }
}

// ── Project config ───────────────────────────────────────────────────────

/// Contents of `slidef.config.json`.
///
/// Every recognised field has a default, so a missing file or a partial
/// file both produce a complete config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectConfig {
    pub title: String,
    pub subtitle: String,
    pub base_url: String,
    pub publish_dir: String,
    pub slides_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeConfig>,
    /// Keys this version does not understand, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            title: "Slide Presentations".into(),
            subtitle: "View and manage your slide decks".into(),
            base_url: "/".into(),
            publish_dir: "public".into(),
            slides_dir: "slides".into(),
            theme: None,
            extra: Map::new(),
        }
    }
}

impl ProjectConfig {
    /// Path of the config file under `root`.
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(CONFIG_FILE_NAME)
    }

    /// Load the config from `root`, falling back to defaults when the file
    /// does not exist.
    ///
    /// A file that exists but is not valid JSON is an error rather than a
    /// silent fallback: publishing with the wrong `publishDir` is worse
    /// than refusing to run.
    pub async fn load(root: &Path) -> Result<Self, SlidefError> {
        let path = Self::path_in(root);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No {} in {}, using defaults", CONFIG_FILE_NAME, root.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(SlidefError::io(path, e)),
        };
        Self::from_json(&text)
            .map_err(|e| SlidefError::Validation(format!("{}: {}", path.display(), e)))
    }

    /// Parse a config document, filling absent fields from the defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Shallow-merge a JSON object over this config.
    ///
    /// Top-level keys in `patch` replace the current value wholesale
    /// (a `theme` patch replaces the whole theme). Non-object patches are
    /// rejected.
    pub fn merge(&self, patch: Value) -> Result<Self, SlidefError> {
        let Value::Object(patch) = patch else {
            return Err(SlidefError::Validation(
                "config patch must be a JSON object".into(),
            ));
        };
        let mut current = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => return Err(SlidefError::Internal(e.to_string())),
        };
        for (key, value) in patch {
            current.insert(key, value);
        }
        serde_json::from_value(Value::Object(current))
            .map_err(|e| SlidefError::Validation(format!("config patch: {e}")))
    }

    /// Write the config under `root` as pretty JSON (temp file + rename).
    pub async fn save(&self, root: &Path) -> Result<(), SlidefError> {
        let path = Self::path_in(root);
        let json =
            serde_json::to_string_pretty(self).map_err(|e| SlidefError::Internal(e.to_string()))?;
        crate::store::write_atomic(&path, json.as_bytes()).await
    }

    /// The slide store root, resolved against `root`.
    pub fn slides_path(&self, root: &Path) -> PathBuf {
        root.join(&self.slides_dir)
    }

    /// The publish output directory, resolved against `root`.
    pub fn publish_path(&self, root: &Path) -> PathBuf {
        root.join(&self.publish_dir)
    }
}

/// Optional colour/font overrides applied to the published viewer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThemeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

impl ThemeConfig {
    /// CSS custom-property overrides for the viewer stylesheet.
    pub fn to_css(&self) -> String {
        let vars = [
            ("--primary-color", &self.primary_color),
            ("--bg-primary", &self.background_color),
            ("--text-primary", &self.text_color),
            ("--progress-fill", &self.progress_color),
            ("--font-family", &self.font_family),
        ];

        let mut css = String::from(":root {\n");
        for (name, value) in vars {
            if let Some(v) = value {
                css.push_str(&format!("  {name}: {v};\n"));
            }
        }
        css.push('}');

        if let Some(ref font) = self.font_family {
            css.push_str(&format!("\nbody {{ font-family: {font}; }}"));
        }
        css
    }
}
