//! CLI binary for slidef.
//!
//! A thin shim over the library crate that maps subcommands onto
//! [`ArtifactStore`] and [`publish`] calls and prints results.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use slidef::live_reload::{ChangeWatcher, ReloadHub, WatchConfig};
use slidef::{
    publish, ArtifactStore, ImageFormat, ImportOptions, MetadataPatch, PdfiumEngine,
    ProjectConfig, Rasterizer, RenderOptions, RenderProgressCallback,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Progress bar over the pages of one import.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Opening");
        bar.set_message("PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl RenderProgressCallback for CliProgressCallback {
    fn on_render_start(&self, total_pages: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        self.bar.set_length(total_pages as u64);
        self.bar.set_prefix("Rendering");
    }

    fn on_page_rendered(&self, _page_num: usize, _total_pages: usize, _bytes: usize) {
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: String) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&error)
        ));
    }

    fn on_render_complete(&self, _total_pages: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Import a deck (slug derived from the file name)
  slidef import talks/My\ Talk.pdf

  # Smaller JPEG pages under an explicit name
  slidef import deck.pdf --name keynote --format jpeg --quality 70 --scale 1.5

  # Edit presentation fields
  slidef update keynote --title "Keynote 2026" --created-at 2026-10-16

  # Build the static site into publishDir (default: public/)
  slidef publish

  # Stream live-reload events while editing
  slidef watch

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium (file or directory)
  RUST_LOG          Log filter, e.g. slidef=debug
"#;

#[derive(Parser, Debug)]
#[command(
    name = "slidef",
    version,
    about = "Convert PDF slide decks into browsable static image sequences",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Project root containing slidef.config.json.
    #[arg(long, global = true, env = "SLIDEF_ROOT", default_value = ".")]
    root: PathBuf,

    #[arg(short, long, global = true, env = "SLIDEF_VERBOSE")]
    verbose: bool,

    #[arg(short, long, global = true, env = "SLIDEF_QUIET")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a PDF into a new slide deck.
    Import {
        pdf: PathBuf,

        /// Base name for the slug. Default: the file name without extension.
        #[arg(long)]
        name: Option<String>,

        /// Display title. Default: the base name.
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Multiplier on the page size in points (1.0 = 72 DPI).
        #[arg(long, default_value_t = 2.0)]
        scale: f32,

        #[arg(long, default_value = "webp")]
        format: ImageFormat,

        /// Lossy quality, 0-100. Ignored for png.
        #[arg(long, default_value_t = 85, allow_negative_numbers = true)]
        quality: i64,

        #[arg(long)]
        no_progress: bool,
    },

    /// List imported slide decks.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Delete a slide deck.
    Remove { slug: String },

    /// Edit the title, description or date of a slide deck.
    Update {
        slug: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// YYYY-MM-DD
        #[arg(long)]
        created_at: Option<NaiveDate>,
    },

    /// Write slides-index.json and copy every deck into the publish directory.
    Publish {
        /// Output directory. Default: publishDir from the config.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Slide store. Default: slidesDir from the config.
        #[arg(long)]
        slides: Option<PathBuf>,
    },

    /// Watch the slide store and config, printing live-reload events.
    Watch {
        /// Extra directories to watch.
        #[arg(long = "dir")]
        dirs: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The import progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet
        && matches!(cli.command, Command::Import { no_progress: false, .. });
    let filter = if cli.quiet || show_progress {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = ProjectConfig::load(&cli.root)
        .await
        .context("Failed to load project config")?;

    match cli.command {
        Command::Import {
            pdf,
            name,
            title,
            description,
            scale,
            format,
            quality,
            no_progress: _,
        } => {
            let mut builder = RenderOptions::builder()
                .scale(scale)
                .format(format)
                .quality(quality);
            if show_progress {
                builder = builder.progress_callback(CliProgressCallback::new());
            }
            let render = builder.build().context("Invalid render options")?;

            let store = ArtifactStore::new(
                config.slides_path(&cli.root),
                Rasterizer::pdfium().context("PDF engine unavailable")?,
            );
            let deck = store
                .import_file(
                    &pdf,
                    ImportOptions {
                        name,
                        title,
                        description,
                        created_at: None,
                        render,
                    },
                )
                .await
                .with_context(|| format!("Failed to import {}", pdf.display()))?;

            if !cli.quiet {
                let encoding = if format.is_lossy() {
                    format!("{format} q{quality}")
                } else {
                    format.to_string()
                };
                eprintln!(
                    "{} {} → {}  {}",
                    green("✔"),
                    bold(deck.display_title()),
                    deck.name,
                    dim(&format!("{} pages, {}", deck.page_count, encoding))
                );
            }
        }

        Command::List { json } => {
            let store = offline_store(config.slides_path(&cli.root));
            let slides = store.list_all().await.context("Failed to list slides")?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&slides).context("Failed to serialize")?
                );
            } else if slides.is_empty() {
                eprintln!("No slide decks found. Run `slidef import <pdf>` first.");
            } else {
                println!("{}", bold(&format!("Slide decks ({})", slides.len())));
                for s in &slides {
                    println!(
                        "  {:<28} {:>4} pages  {}  {}",
                        s.name,
                        s.page_count,
                        s.created_at,
                        dim(s.display_title())
                    );
                }
            }
        }

        Command::Remove { slug } => {
            let store = offline_store(config.slides_path(&cli.root));
            store
                .remove(&slug)
                .await
                .with_context(|| format!("Failed to remove {slug}"))?;
            if !cli.quiet {
                eprintln!("{} removed {}", green("✔"), slug);
            }
        }

        Command::Update {
            slug,
            title,
            description,
            created_at,
        } => {
            let patch = MetadataPatch {
                title,
                description,
                created_at,
            };
            if patch.is_empty() {
                bail!("Nothing to update: pass --title, --description or --created-at");
            }
            let store = offline_store(config.slides_path(&cli.root));
            let deck = store
                .update(&slug, patch)
                .await
                .with_context(|| format!("Failed to update {slug}"))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&deck).context("Failed to serialize")?
            );
        }

        Command::Publish { output, slides } => {
            let slides_dir = slides.unwrap_or_else(|| config.slides_path(&cli.root));
            let output = output.unwrap_or_else(|| config.publish_path(&cli.root));
            let store = offline_store(slides_dir);
            let report = publish::publish(&store, &config, &output)
                .await
                .context("Failed to publish")?;

            if report.slide_count == 0 && !cli.quiet {
                eprintln!("No slides found to publish.");
            }
            if !cli.quiet {
                for name in &report.pruned {
                    eprintln!("  {} {}", dim("removed stale"), name);
                }
                eprintln!(
                    "{} published {} decks to {}",
                    green("✔"),
                    bold(&report.slide_count.to_string()),
                    output.display()
                );
            }
        }

        Command::Watch { dirs } => {
            let mut watch = WatchConfig::for_project(&cli.root, &config);
            for dir in dirs {
                watch = watch.watch_dir(dir);
            }

            let hub = Arc::new(ReloadHub::new());
            let mut frames = Box::pin(hub.subscribe_stream().context("Failed to subscribe")?);
            let _watcher =
                ChangeWatcher::start(watch, hub.clone()).context("Failed to start watcher")?;
            eprintln!("Watching {} (Ctrl-C to stop)", display_root(&cli.root));

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    frame = frames.next() => match frame {
                        Some(frame) => print!("{frame}"),
                        None => break,
                    },
                }
            }
        }
    }

    Ok(())
}

/// Store for commands that never render. The pdfium library is not bound.
fn offline_store(root: PathBuf) -> ArtifactStore {
    ArtifactStore::new(root, Rasterizer::new(Arc::new(PdfiumEngine)))
}

fn display_root(root: &Path) -> String {
    std::fs::canonicalize(root)
        .unwrap_or_else(|_| root.to_path_buf())
        .display()
        .to_string()
}
