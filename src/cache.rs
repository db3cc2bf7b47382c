//! # Cache Index Module
//!
//! Questo modulo gestisce il tracking dei file già ottimizzati per evitare upload inutili.
//!
//! ## Responsabilità:
//! - Associa ogni file al fingerprint (SHA-256) del suo contenuto dopo l'ultima ottimizzazione
//! - Decide se un candidato va elaborato (`should_process`)
//! - Registra il nuovo fingerprint dopo una sovrascrittura riuscita (`record_success`)
//! - Persiste lo snapshot JSON in modo atomico (`persist`)
//! - Cleanup di entry per file che non esistono più
//!
//! ## Strategia di persistence:
//! - Un unico file JSON, di default `~/.tinypng-cache.json`
//! - Caricato una volta all'avvio, scritto una volta a fine run
//! - Snapshot mancante o corrotto = cache vuota, mai un errore
//!
//! ## Prevenzione rielaborazione:
//! - Il fingerprint è calcolato sui byte del file, non sul path o sul mtime
//! - Un file modificato dopo l'ottimizzazione viene rielaborato
//!
//! ## Esempio struttura snapshot:
//! ```json
//! {
//!   "/path/image.png": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//! }
//! ```

use crate::error::{OptimizeError, Result};
use crate::file_manager::FileManager;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Persisted mapping from file path to content fingerprint
#[derive(Debug, Default)]
pub struct CacheIndex {
    entries: Mutex<HashMap<String, String>>,
}

impl CacheIndex {
    /// Load the snapshot at `location`.
    ///
    /// Never fails: a missing, unreadable or malformed snapshot gives an
    /// empty index.
    pub async fn load(location: &Path) -> Self {
        let entries = match fs::read_to_string(location).await {
            Ok(content) => match serde_json::from_str::<HashMap<String, String>>(&content) {
                Ok(entries) => {
                    debug!("Loaded {} cache entries from {}", entries.len(), location.display());
                    entries
                }
                Err(e) => {
                    warn!("Ignoring malformed cache snapshot {}: {}", location.display(), e);
                    HashMap::new()
                }
            },
            Err(e) => {
                debug!("No cache snapshot at {} ({}), starting empty", location.display(), e);
                HashMap::new()
            }
        };

        Self {
            entries: Mutex::new(entries),
        }
    }

    /// SHA-256 of the file content, hex encoded
    pub async fn fingerprint(path: &Path) -> Result<String> {
        let mut file = fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 64 * 1024];

        loop {
            let read = file.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Key under which a file is stored: canonical path when available
    pub async fn key_for(path: &Path) -> String {
        fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf())
            .to_string_lossy()
            .to_string()
    }

    /// Whether `path` needs an upload.
    ///
    /// The file is only hashed when an entry exists for it.
    pub async fn should_process(&self, path: &Path, force: bool) -> Result<bool> {
        if force {
            return Ok(true);
        }

        let key = Self::key_for(path).await;
        let stored = self.entries.lock().await.get(&key).cloned();

        match stored {
            None => Ok(true),
            Some(stored) => {
                let current = Self::fingerprint(path).await?;
                Ok(current != stored)
            }
        }
    }

    /// Record the fingerprint of the file's current on-disk content.
    ///
    /// Call only after the optimized bytes have been fully written.
    pub async fn record_success(&self, path: &Path) -> Result<()> {
        let key = Self::key_for(path).await;
        let fingerprint = Self::fingerprint(path).await?;

        debug!("Caching {} -> {}", key, &fingerprint[..12]);
        self.entries.lock().await.insert(key, fingerprint);
        Ok(())
    }

    /// Stored fingerprint for `path`, if any
    pub async fn get(&self, path: &Path) -> Option<String> {
        let key = Self::key_for(path).await;
        self.entries.lock().await.get(&key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Write the whole mapping to `location`, replacing any previous snapshot atomically
    pub async fn persist(&self, location: &Path) -> Result<()> {
        let snapshot: BTreeMap<String, String> = self
            .entries
            .lock()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let content = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| OptimizeError::Cache(e.to_string()))?;

        FileManager::write_atomic(location, content).await?;
        debug!("Persisted {} cache entries to {}", snapshot.len(), location.display());
        Ok(())
    }

    /// Clean up old entries (files that no longer exist)
    pub async fn prune_missing(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, _| PathBuf::from(key).exists());
        before - entries.len()
    }

    /// Delete the snapshot at `location`. Returns whether one existed.
    pub async fn clear(location: &Path) -> Result<bool> {
        match fs::remove_file(location).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
