use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use bulletin_editor_core::{EditorSurface, Selection};
use bulletin_editor_media::{InsertionSource, MediaBlob, MediaPipeline};
use clap::{Parser, Subcommand, ValueEnum};
use miette::{IntoDiagnostic, Result};

use crate::config::Config;
use crate::sink::JsonSink;
use crate::store::FsStore;

mod config;
mod sink;
mod store;

#[derive(Parser)]
#[command(version, about = "Bulletin - normalize and edit department board posts", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a TOML config file with [editor] and [media] tables
    #[arg(long, global = true, env = "BULLETIN_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hydrate a stored post and print its normalized HTML
    Normalize {
        /// Post HTML file
        file: PathBuf,

        /// Print the display form (node ids, placeholder) instead
        #[arg(long)]
        display: bool,

        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print the payload a save hands to the document sink, as JSON
    Save {
        /// Post HTML file
        file: PathBuf,
    },
    /// Upload images into a store directory and insert them into a post
    InsertImage {
        /// Post HTML file
        file: PathBuf,

        /// Images to insert, in order
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Directory uploaded images are written to
        #[arg(long)]
        store: PathBuf,

        /// URL prefix the store directory is served under
        #[arg(long, default_value = "/files")]
        base_url: String,

        /// Where the images go
        #[arg(long, value_enum, default_value_t = Placement::End)]
        at: Placement,

        /// Write to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Placement {
    Start,
    End,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_miette();
    init_tracing();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Normalize {
            file,
            display,
            output,
        } => {
            let html = normalize(&config, &file, display).await?;
            emit(output.as_deref(), &html).await?;
        }
        Commands::Save { file } => {
            let surface = hydrate(&config, &file).await?;
            save(&surface, std::io::stdout().lock())?;
        }
        Commands::InsertImage {
            file,
            images,
            store,
            base_url,
            at,
            output,
        } => {
            let store = FsStore::new(store, &base_url);
            let html = insert_images(&config, &file, &images, store, at).await?;
            emit(output.as_deref(), &html).await?;
        }
    }

    Ok(())
}

async fn hydrate(config: &Config, file: &Path) -> Result<EditorSurface> {
    let html = tokio::fs::read_to_string(file).await.into_diagnostic()?;
    let mut surface = EditorSurface::new(config.editor.clone());
    surface.hydrate(&html)?;
    tracing::debug!(file = %file.display(), keys = surface.extract_media_keys().len(), "hydrated post");
    Ok(surface)
}

async fn normalize(config: &Config, file: &Path, display: bool) -> Result<String> {
    let surface = hydrate(config, file).await?;
    Ok(if display {
        surface.render()
    } else {
        surface.serialize()
    })
}

fn save(surface: &EditorSurface, out: impl Write) -> Result<()> {
    let mut sink = JsonSink::new(out);
    surface.save(&mut sink).into_diagnostic()?;
    Ok(())
}

async fn insert_images(
    config: &Config,
    file: &Path,
    images: &[PathBuf],
    store: FsStore,
    at: Placement,
) -> Result<String> {
    let surface = Rc::new(RefCell::new(hydrate(config, file).await?));
    {
        let mut surface = surface.borrow_mut();
        match at {
            Placement::Start => {
                let start = surface.tree().start_position().map(Selection::collapsed);
                surface.set_selection(start);
            }
            Placement::End => {
                surface.select_end();
            }
        }
    }

    let pipeline = MediaPipeline::new(&surface, store, config.media.clone());
    for path in images {
        let data = tokio::fs::read(path).await.into_diagnostic()?;
        let mut blob = MediaBlob::new(data);
        if let Some(name) = path.file_name() {
            blob = blob.with_name(name.to_string_lossy().as_ref());
        }
        let outcome = pipeline.insert(blob, InsertionSource::Toolbar).await?;
        tracing::info!(key = %outcome.key, path = %path.display(), mime = %outcome.mime, "inserted image");
    }

    let html = surface.borrow().serialize();
    Ok(html)
}

async fn emit(output: Option<&Path>, html: &str) -> Result<()> {
    match output {
        Some(path) => tokio::fs::write(path, format!("{html}\n"))
            .await
            .into_diagnostic(),
        None => {
            println!("{html}");
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

fn init_miette() {
    // Only fails if a hook is already installed, and ours is the first.
    let _ = miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .with_cause_chain()
                .context_lines(3)
                .build(),
        )
    }));
    miette::set_panic_hook();
}
