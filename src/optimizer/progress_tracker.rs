//! # Progress Tracking Module
//!
//! Tracker thread-safe condiviso da tutti i job di una sessione.
//! Aggiorna sia le statistiche che la progress bar.

use crate::{
    optimizer::job::JobOutcome,
    progress::{OptimizationStats, ProgressManager},
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Tracker progress unificato
#[derive(Clone)]
pub struct ProgressTracker {
    stats: Arc<Mutex<OptimizationStats>>,
    progress_manager: ProgressManager,
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap_or_default().to_string_lossy().to_string()
}

impl ProgressTracker {
    /// Crea un nuovo tracker con progress bar
    pub fn new(total_files: usize) -> Self {
        Self {
            stats: Arc::new(Mutex::new(OptimizationStats::new())),
            progress_manager: ProgressManager::new(total_files as u64),
        }
    }

    /// Tracker senza output a terminale
    pub fn hidden() -> Self {
        Self {
            stats: Arc::new(Mutex::new(OptimizationStats::new())),
            progress_manager: ProgressManager::hidden(),
        }
    }

    /// Registra l'esito finale di un job
    pub async fn record(&self, path: &Path, outcome: &JobOutcome) {
        let message = {
            let mut stats = self.stats.lock().await;
            match outcome {
                JobOutcome::Cached {
                    input_size,
                    output_size,
                } => {
                    stats.add_optimized(*input_size, *output_size);
                    format!(
                        "[OK] {}: {}% saved",
                        file_name(path),
                        crate::file_manager::FileManager::reduction_percent(*input_size, *output_size)
                    )
                }
                JobOutcome::NoGain { size } => {
                    stats.add_no_gain(*size);
                    format!("[SKIP] {}: no optimization possible", file_name(path))
                }
                JobOutcome::Failed(_) => {
                    stats.add_error();
                    format!("[ERROR] {}: error", file_name(path))
                }
            }
        };
        self.progress_manager.update(&message);
    }

    /// File invariato dall'ultima ottimizzazione
    pub async fn add_cached(&self, path: &Path) {
        self.stats.lock().await.files_cached += 1;
        self.progress_manager
            .update(&format!("[SKIP] {}: already optimized", file_name(path)));
    }

    /// File escluso da un filtro di dimensione/peso
    pub async fn add_filtered(&self, path: &Path) {
        self.stats.lock().await.files_filtered += 1;
        self.progress_manager
            .update(&format!("[SKIP] {}: filtered", file_name(path)));
    }

    /// File che sarebbe stato caricato (dry run)
    pub async fn add_would_run(&self, path: &Path) {
        self.stats.lock().await.files_would_run += 1;
        self.progress_manager
            .update(&format!("[DRY] {}: would optimize", file_name(path)));
    }

    /// Errore prima dell'ammissione (es. file illeggibile)
    pub async fn add_error(&self, path: &Path) {
        self.stats.lock().await.add_error();
        self.progress_manager
            .update(&format!("[ERROR] {}: error", file_name(path)));
    }

    /// Ultimo contatore mensile riportato dal servizio
    pub async fn set_compression_count(&self, count: u64) {
        self.stats.lock().await.compression_count = Some(count);
    }

    /// Finalizza progress bar
    pub fn finish(&self, summary: &str) {
        self.progress_manager.finish(summary);
    }

    /// Ottieni statistiche per report finale
    pub async fn stats(&self) -> OptimizationStats {
        self.stats.lock().await.clone()
    }
}
