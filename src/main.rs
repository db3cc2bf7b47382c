//! # TinyPNG Batch Optimizer - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Ricerca della chiave API (`-k` oppure `~/.tinypng`)
//! - Manutenzione della cache (`--clear-cache`, `--prune-cache`)
//! - Creazione della configurazione e avvio dell'optimizer
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (percorsi, resize, filtri, concorrenza, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose, `RUST_LOG` ha precedenza)
//! 3. Carica l'eventuale file di configurazione e applica i flag sopra
//! 4. Cerca le immagini PNG/JPEG nei percorsi indicati
//! 5. Istanzia Optimizer e avvia il processo di ottimizzazione
//!
//! ## Esempio di utilizzo:
//! ```bash
//! tinypng assets/ -r --width 1024 -c 4 --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use tinypng_batch::{
    config::KEY_FILE_NAME, CacheIndex, Concurrency, Config, FileManager, Optimizer, ResizeMethod,
    ResizeSpec,
};

#[derive(Parser)]
#[command(name = "tinypng", version)]
#[command(about = "Shrink PNG and JPEG images with the TinyPNG service, skipping files already optimized")]
struct Args {
    /// Files or directories to optimize
    #[arg(default_value = ".")]
    paths: Vec<PathBuf>,

    /// TinyPNG API key (defaults to the contents of ~/.tinypng)
    #[arg(short, long)]
    key: Option<String>,

    /// Walk given directories recursively
    #[arg(short, long)]
    recursive: bool,

    /// Resize images to this width
    #[arg(long)]
    width: Option<u32>,

    /// Resize images to this height
    #[arg(long)]
    height: Option<u32>,

    /// Resize method: scale, fit or cover
    #[arg(long)]
    resize_method: Option<ResizeMethod>,

    /// Only process images whose larger side is at least this many pixels
    #[arg(long, value_name = "PIXELS")]
    if_larger_than: Option<u32>,

    /// Only process files of at least this many bytes
    #[arg(long, value_name = "BYTES")]
    if_bigger_than: Option<u64>,

    /// Delete the cache file and exit
    #[arg(long)]
    clear_cache: bool,

    /// Drop cache entries of files that no longer exist and exit
    #[arg(long)]
    prune_cache: bool,

    /// Upload files even when the cache says they are already optimized
    #[arg(short, long)]
    force: bool,

    /// Dry run - list what would be uploaded, change nothing
    #[arg(long)]
    dry_run: bool,

    /// Maximum number of concurrent uploads (negative = unlimited)
    #[arg(short, long, allow_hyphen_values = true)]
    concurrency: Option<i64>,

    /// Cache file location (default: ~/.tinypng-cache.json)
    #[arg(long)]
    cache: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            Config::from_file(path).await?
        }
        None => Config::default(),
    };
    apply_flags(&mut config, &args)?;

    // Manutenzione cache: non serve la chiave API
    if args.clear_cache {
        if CacheIndex::clear(&config.cache_path).await? {
            info!("Cache cleared: {}", config.cache_path.display());
        } else {
            info!("No cache file at {}", config.cache_path.display());
        }
        return Ok(());
    }

    if args.prune_cache {
        let cache = CacheIndex::load(&config.cache_path).await;
        let removed = cache.prune_missing().await;
        cache.persist(&config.cache_path).await?;
        info!("Removed {} stale cache entries, {} left", removed, cache.len().await);
        return Ok(());
    }

    if config.api_key.trim().is_empty() {
        config.api_key = discover_key().await.unwrap_or_default();
    }

    let files = FileManager::find_images(&args.paths, args.recursive);
    if files.is_empty() {
        warn!("No PNG or JPEG images found");
        return Ok(());
    }

    let optimizer = Optimizer::new(config)?;
    optimizer.run(files).await?;

    Ok(())
}

/// Applica i flag della command line sopra la configurazione
fn apply_flags(config: &mut Config, args: &Args) -> Result<()> {
    if let Some(key) = &args.key {
        config.api_key = key.trim().to_string();
    }
    if let Some(resize) = ResizeSpec::from_flags(args.width, args.height, args.resize_method)? {
        config.resize = Some(resize);
    }
    if args.if_larger_than.is_some() {
        config.min_dimension = args.if_larger_than;
    }
    if args.if_bigger_than.is_some() {
        config.min_file_size = args.if_bigger_than;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = Concurrency::from(concurrency);
    }
    if let Some(cache) = &args.cache {
        config.cache_path = cache.clone();
    }
    config.force |= args.force;
    config.dry_run |= args.dry_run;
    Ok(())
}

/// Legge la chiave da `~/.tinypng`
async fn discover_key() -> Option<String> {
    let path = dirs::home_dir()?.join(KEY_FILE_NAME);
    read_key(&path).await
}

async fn read_key(path: &Path) -> Option<String> {
    let content = tokio::fs::read_to_string(path).await.ok()?;
    let key = content.trim();
    if key.is_empty() {
        None
    } else {
        debug!("Using API key from {}", path.display());
        Some(key.to_string())
    }
}
