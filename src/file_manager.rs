//! # File Management Module
//!
//! Questo modulo gestisce tutte le operazioni sui file e la discovery delle immagini.
//!
//! ## Responsabilità:
//! - Discovery (opzionalmente ricorsiva) di file PNG/JPEG
//! - Deduplicazione dei candidati mantenendo l'ordine di scoperta
//! - Sovrascrittura atomica dei file con il contenuto ottimizzato
//! - Utilità per dimensioni e percentuali di riduzione
//!
//! ## Formati supportati:
//! - **Immagini**: PNG, JPG, JPEG (estensione case-insensitive)
//!
//! ## Sicurezza operazioni:
//! - Il nuovo contenuto viene scritto in un file temporaneo nella stessa directory
//! - `fsync` prima del rename, così il file finale è sempre completo
//! - I permessi del file originale vengono preservati
//!
//! ## Esempio:
//! ```rust,ignore
//! let files = FileManager::find_images(&[PathBuf::from("assets")], true);
//! for file in files {
//!     // submit file
//! }
//! ```

use crate::error::{OptimizeError, Result};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Size of a file in bytes
    pub async fn file_size(path: &Path) -> Result<u64> {
        Ok(fs::metadata(path).await?.len())
    }

    /// Collect candidate images from files and directories.
    ///
    /// Directories contribute their images (all levels when `recursive`),
    /// files are kept when their extension matches. Missing inputs are
    /// ignored. Duplicates are removed keeping the first occurrence.
    pub fn find_images(inputs: &[PathBuf], recursive: bool) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for input in inputs {
            if input.is_dir() {
                let walker = WalkDir::new(input)
                    .min_depth(1)
                    .max_depth(if recursive { usize::MAX } else { 1 })
                    .sort_by_file_name();

                for entry in walker
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                {
                    let path = entry.into_path();
                    if Self::is_supported_format(&path) && seen.insert(path.clone()) {
                        files.push(path);
                    }
                }
            } else if input.is_file() {
                if Self::is_supported_format(input) && seen.insert(input.clone()) {
                    files.push(input.clone());
                }
            } else {
                debug!("Ignoring missing input: {}", input.display());
            }
        }

        files
    }

    /// Check if a file format is supported
    pub fn is_supported_format(path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            matches!(ext_lower.as_str(), "png" | "jpg" | "jpeg")
        } else {
            false
        }
    }

    /// Replace the content of `target` with `contents`.
    ///
    /// Returns only once the new bytes are synced and renamed into place.
    pub async fn write_atomic(target: &Path, contents: Vec<u8>) -> Result<()> {
        let target = target.to_path_buf();
        tokio::task::spawn_blocking(move || Self::write_atomic_blocking(&target, &contents))
            .await
            .map_err(|e| OptimizeError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }

    fn write_atomic_blocking(target: &Path, contents: &[u8]) -> Result<()> {
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(contents)?;
        temp.as_file().sync_all()?;

        // NamedTempFile nasce con permessi 0600, riprendi quelli dell'originale
        if let Ok(metadata) = std::fs::metadata(target) {
            std::fs::set_permissions(temp.path(), metadata.permissions())?;
        }

        temp.persist(target).map_err(|e| OptimizeError::Io(e.error))?;
        Ok(())
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Percentage saved, rounded: `round(100 - 100 * new / original)`
    pub fn reduction_percent(original_size: u64, new_size: u64) -> i64 {
        if original_size == 0 {
            0
        } else {
            (100.0 - 100.0 * new_size as f64 / original_size as f64).round() as i64
        }
    }
}
