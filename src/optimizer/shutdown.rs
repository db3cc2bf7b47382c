//! # Shutdown Coordinator
//!
//! Barriera di fine run: attende che tutti i job abbiano rilasciato lo slot
//! e solo dopo scrive lo snapshot della cache, una volta sola.

use crate::{cache::CacheIndex, config::DrainPolicy, optimizer::scheduler::JobScheduler};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

/// What happened at shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Persisted,
    /// Dry run: the snapshot is left untouched
    Skipped,
    /// The write failed; logged, the run still completes
    Failed,
}

/// Drains the scheduler, then persists the cache
pub struct ShutdownCoordinator {
    scheduler: JobScheduler,
    cache: Arc<CacheIndex>,
    location: PathBuf,
    policy: DrainPolicy,
    persist: bool,
}

impl ShutdownCoordinator {
    pub fn new(
        scheduler: JobScheduler,
        cache: Arc<CacheIndex>,
        location: PathBuf,
        policy: DrainPolicy,
    ) -> Self {
        Self {
            scheduler,
            cache,
            location,
            policy,
            persist: true,
        }
    }

    /// Leave the snapshot untouched (dry run)
    pub fn without_persist(mut self) -> Self {
        self.persist = false;
        self
    }

    /// Scheduler still accepting submissions until shutdown
    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// Wait for every outstanding job, then write the cache once
    pub async fn shutdown(self) -> FlushOutcome {
        self.scheduler.await_drain(self.policy).await;

        if !self.persist {
            debug!("Dry run, cache snapshot not written");
            return FlushOutcome::Skipped;
        }

        match self.cache.persist(&self.location).await {
            Ok(()) => {
                info!(
                    "Cache saved ({} entries) to {}",
                    self.cache.len().await,
                    self.location.display()
                );
                FlushOutcome::Persisted
            }
            Err(e) => {
                error!("Cannot write cache file {}: {}", self.location.display(), e);
                FlushOutcome::Failed
            }
        }
    }
}
