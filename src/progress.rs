//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche della sessione.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Tracking statistiche della sessione (file ottimizzati, saltati, errori)
//! - Report finale con byte risparmiati e contatore mensile del servizio
//!
//! ## Statistiche tracciate:
//! - **files_optimized**: File scaricati, sovrascritti e registrati in cache
//! - **files_no_gain**: Il servizio non è riuscito a ridurre il file
//! - **files_cached**: Contenuto invariato dall'ultima ottimizzazione
//! - **files_filtered**: Esclusi dai filtri `--if-larger-than` / `--if-bigger-than`
//! - **files_would_run**: Candidati riportati in dry run
//! - **errors**: Job falliti
//! - **total_bytes_saved**: Byte totali risparmiati
//! - **compression_count**: Compressioni usate nel mese (dal servizio)
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [========================================] 24/24 (100%) [OK] logo.png: 63% saved
//! ```

use crate::file_manager::FileManager;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages progress reporting on stderr
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// A manager that draws nothing
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Statistics for one run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OptimizationStats {
    pub files_optimized: usize,
    pub files_no_gain: usize,
    pub files_cached: usize,
    pub files_filtered: usize,
    pub files_would_run: usize,
    pub errors: usize,
    pub total_bytes_saved: u64,
    pub total_original_size: u64,
    pub compression_count: Option<u64>,
}

impl OptimizationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_optimized(&mut self, original_size: u64, new_size: u64) {
        self.files_optimized += 1;
        self.total_original_size += original_size;
        self.total_bytes_saved += original_size.saturating_sub(new_size);
    }

    pub fn add_no_gain(&mut self, original_size: u64) {
        self.files_no_gain += 1;
        self.total_original_size += original_size;
    }

    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    /// Files that reached a terminal state this run
    pub fn files_processed(&self) -> usize {
        self.files_optimized + self.files_no_gain + self.errors
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        if self.total_original_size > 0 {
            (self.total_bytes_saved as f64 / self.total_original_size as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn format_summary(&self) -> String {
        let mut summary = format!(
            "Optimized: {} | No gain: {} | Cached: {} | Filtered: {} | Errors: {} | Total saved: {} ({:.2}%)",
            self.files_optimized,
            self.files_no_gain,
            self.files_cached,
            self.files_filtered,
            self.errors,
            FileManager::format_size(self.total_bytes_saved),
            self.overall_reduction_percent()
        );

        if self.files_would_run > 0 {
            summary.push_str(&format!(" | Would optimize: {}", self.files_would_run));
        }
        if let Some(count) = self.compression_count {
            summary.push_str(&format!(" | Compressions this month: {}", count));
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_accumulate() {
        let mut stats = OptimizationStats::new();
        stats.add_optimized(1000, 400);
        stats.add_no_gain(1000);
        stats.add_error();

        assert_eq!(stats.files_processed(), 3);
        assert_eq!(stats.total_bytes_saved, 600);
        assert_eq!(stats.total_original_size, 2000);
        assert!((stats.overall_reduction_percent() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_summary_mentions_counts() {
        let mut stats = OptimizationStats::new();
        stats.add_optimized(2048, 1024);
        let summary = stats.format_summary();
        assert!(summary.contains("Optimized: 1"));
        assert!(summary.contains("1.00 KB"));
    }

    #[test]
    fn test_summary_reports_monthly_compressions() {
        let stats = OptimizationStats {
            compression_count: Some(4242),
            ..Default::default()
        };
        assert!(stats.format_summary().contains("Compressions this month: 4242"));
        assert!(!OptimizationStats::new().format_summary().contains("Compressions"));
    }

    #[test]
    fn test_summary_reports_dry_run_candidates() {
        let stats = OptimizationStats {
            files_would_run: 3,
            ..Default::default()
        };
        assert!(stats.format_summary().contains("Would optimize: 3"));
    }

    #[test]
    fn test_empty_stats_have_zero_reduction() {
        assert_eq!(OptimizationStats::new().overall_reduction_percent(), 0.0);
    }
}
