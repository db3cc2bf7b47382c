//! # Optimize Job Module
//!
//! Macchina a stati per l'ottimizzazione di un singolo file.
//!
//! ## Stati:
//! `Pending → Uploading → {Skipped, Failed, Downloading | Resizing} → Completed → Cached`
//!
//! ## Ordine garantito all'interno del job:
//! 1. upload completato e risposta interpretata
//! 2. download del risultato (ridimensionato se richiesto)
//! 3. sovrascrittura atomica del file
//! 4. solo dopo: aggiornamento della cache
//!
//! Ogni ramo termina localmente; nessun errore risale allo scheduler.

use crate::{
    cache::CacheIndex,
    client::CompressionService,
    config::{Config, ResizeSpec},
    error::OptimizeError,
    file_manager::FileManager,
    optimizer::progress_tracker::ProgressTracker,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Lifecycle of an optimization job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Uploading,
    Downloading,
    Resizing,
    Completed,
    Cached,
    Skipped,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cached | Self::Skipped | Self::Failed)
    }
}

/// One image to optimize
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub path: PathBuf,
    pub resize: Option<ResizeSpec>,
    pub force: bool,
    pub dry_run: bool,
}

impl Job {
    pub fn new(path: PathBuf, config: &Config) -> Self {
        Self {
            path,
            resize: config.resize,
            force: config.force,
            dry_run: config.dry_run,
        }
    }
}

/// Terminal result of a job
#[derive(Debug)]
pub enum JobOutcome {
    /// Replaced on disk and recorded in the cache
    Cached { input_size: u64, output_size: u64 },
    /// The service could not make the file smaller
    NoGain { size: u64 },
    Failed(OptimizeError),
}

/// Shared collaborators of every job in a run
pub struct JobContext {
    pub service: Arc<dyn CompressionService>,
    pub cache: Arc<CacheIndex>,
    pub tracker: ProgressTracker,
}

/// Worker per l'elaborazione di un singolo file
pub struct OptimizeJob {
    job: Job,
    context: Arc<JobContext>,
    history: Vec<JobState>,
}

impl OptimizeJob {
    pub fn new(job: Job, context: Arc<JobContext>) -> Self {
        Self {
            job,
            context,
            history: vec![JobState::Pending],
        }
    }

    pub fn path(&self) -> &Path {
        &self.job.path
    }

    /// Current state
    pub fn state(&self) -> JobState {
        self.history.last().copied().unwrap_or(JobState::Pending)
    }

    /// Every state visited so far, in order
    pub fn history(&self) -> &[JobState] {
        &self.history
    }

    fn transition(&mut self, next: JobState) {
        debug!("{}: {:?} -> {:?}", self.job.path.display(), self.state(), next);
        self.history.push(next);
    }

    /// Run the job to a terminal state
    pub async fn run(&mut self) -> JobOutcome {
        self.transition(JobState::Uploading);

        let shrink = match self.context.service.shrink(&self.job.path).await {
            Ok(shrink) => shrink,
            Err(e) => return self.fail(e),
        };

        if let Some(count) = shrink.compression_count {
            self.context.tracker.set_compression_count(count).await;
        }

        if !shrink.is_smaller() {
            self.transition(JobState::Skipped);
            info!("Couldn't compress `{}` any further", self.job.path.display());
            return JobOutcome::NoGain {
                size: shrink.input_size,
            };
        }

        // Scarica il risultato, ridimensionato se richiesto
        self.transition(if self.job.resize.is_some() {
            JobState::Resizing
        } else {
            JobState::Downloading
        });

        let bytes = match self
            .context
            .service
            .fetch(&shrink.output_url, self.job.resize.as_ref())
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => return self.fail(e),
        };
        let written = bytes.len() as u64;

        if let Err(e) = FileManager::write_atomic(&self.job.path, bytes).await {
            return self.fail(e);
        }
        self.transition(JobState::Completed);

        // La cache si aggiorna solo a scrittura confermata
        if let Err(e) = self.context.cache.record_success(&self.job.path).await {
            warn!(
                "`{}` was optimized but could not be cached, it will be uploaded again next run",
                self.job.path.display()
            );
            return self.fail(e);
        }
        self.transition(JobState::Cached);

        // Con resize il file scritto può differire da output.size
        let output_size = if self.job.resize.is_some() {
            written
        } else {
            shrink.output_size
        };

        let saved = if self.job.resize.is_some() {
            shrink.input_size.saturating_sub(output_size)
        } else {
            shrink.bytes_saved()
        };
        info!(
            "Panda just saved you {} ({}%) for `{}`",
            FileManager::format_size(saved),
            FileManager::reduction_percent(shrink.input_size, output_size),
            self.job.path.display()
        );

        JobOutcome::Cached {
            input_size: shrink.input_size,
            output_size,
        }
    }

    fn fail(&mut self, e: OptimizeError) -> JobOutcome {
        self.transition(JobState::Failed);

        let file = self.job.path.display();
        match &e {
            OptimizeError::RateLimited => {
                error!("Compression failed for `{}` as your monthly limit has been exceeded", file)
            }
            OptimizeError::Unauthorized => {
                error!("Compression failed for `{}` as your credentials are invalid", file)
            }
            OptimizeError::InvalidResponse(detail) => {
                error!("Not a valid JSON response for `{}`: {}", file, detail)
            }
            OptimizeError::NoResponse(detail) => {
                error!("Got no response for `{}`: {}", file, detail)
            }
            OptimizeError::Service { code, message } => {
                error!("Compression failed for `{}` ({}: {})", file, code, message)
            }
            other => error!("Failed to optimize `{}`: {}", file, other),
        }

        JobOutcome::Failed(e)
    }
}
