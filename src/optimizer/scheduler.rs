//! # Job Scheduler Module
//!
//! Ammissione dei job con limite di concorrenza e barriera di drain.
//!
//! ## Responsabilità:
//! - Rispetta il limite di job contemporanei (`Concurrency`) con un `Semaphore`
//! - Conta i job ammessi ma non ancora terminati (`outstanding_count`)
//! - Avvia ogni job come task tokio senza attenderne la fine
//! - Permette di attendere che non ci siano più job in corso (`await_drain`)
//!
//! ## Rilascio dello slot:
//! Ogni job possiede un `SlotLease`: quando il task termina (in qualsiasi ramo,
//! anche in caso di panic) il contatore viene decrementato e poi il permesso
//! del semaforo restituito, esattamente una volta.

use crate::{
    config::{Concurrency, DrainPolicy},
    optimizer::job::{Job, JobContext, OptimizeJob},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Result of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The job is running in the background
    Admitted,
    /// Dry run: reported only
    DryRun,
    /// The bound admits no jobs at all
    Rejected,
}

#[derive(Default)]
struct Outstanding {
    count: AtomicUsize,
    drained: Notify,
}

/// Held by a running job; dropping it releases the slot.
///
/// Fields drop in declaration order: the count goes down before the permit
/// is returned, so the count never exceeds the bound.
struct SlotLease {
    outstanding: Arc<Outstanding>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl SlotLease {
    fn acquire(outstanding: Arc<Outstanding>, permit: Option<OwnedSemaphorePermit>) -> Self {
        outstanding.count.fetch_add(1, Ordering::AcqRel);
        Self {
            outstanding,
            _permit: permit,
        }
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        if self.outstanding.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.outstanding.drained.notify_waiters();
        }
    }
}

/// Admits jobs up to the concurrency bound
pub struct JobScheduler {
    context: Arc<JobContext>,
    concurrency: Concurrency,
    slots: Option<Arc<Semaphore>>,
    dry_run: bool,
    outstanding: Arc<Outstanding>,
}

impl JobScheduler {
    pub fn new(concurrency: Concurrency, dry_run: bool, context: Arc<JobContext>) -> Self {
        let slots = match concurrency {
            Concurrency::Limited(max) if max > 0 => Some(Arc::new(Semaphore::new(max))),
            _ => None,
        };

        debug!("Scheduler concurrency: {}", concurrency);

        Self {
            context,
            concurrency,
            slots,
            dry_run,
            outstanding: Arc::new(Outstanding::default()),
        }
    }

    /// Submit a job.
    ///
    /// Waits for a free slot when bounded, then spawns the job and returns
    /// without waiting for it to finish.
    pub async fn submit(&self, job: Job) -> Admission {
        if self.dry_run || job.dry_run {
            info!("Would optimize `{}`", job.path.display());
            self.context.tracker.add_would_run(&job.path).await;
            return Admission::DryRun;
        }

        if self.concurrency == Concurrency::Limited(0) {
            warn!("Concurrency is 0, not admitting `{}`", job.path.display());
            return Admission::Rejected;
        }

        let permit = match &self.slots {
            Some(slots) => match slots.clone().acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => return Admission::Rejected,
            },
            None => None,
        };

        // Il contatore sale prima che il task parta
        let lease = SlotLease::acquire(self.outstanding.clone(), permit);
        let context = self.context.clone();

        tokio::spawn(async move {
            let mut optimize = OptimizeJob::new(job, context.clone());
            let outcome = optimize.run().await;
            context.tracker.record(optimize.path(), &outcome).await;
            drop(lease);
        });

        Admission::Admitted
    }

    /// Jobs admitted but not yet terminal
    pub fn outstanding_count(&self) -> usize {
        self.outstanding.count.load(Ordering::Acquire)
    }

    /// Wait until no job is outstanding.
    ///
    /// Woken by the last finishing job; `poll_interval` bounds each wait as
    /// a fallback re-check.
    pub async fn await_drain(&self, policy: DrainPolicy) {
        if !policy.initial_delay.is_zero() {
            tokio::time::sleep(policy.initial_delay).await;
        }

        loop {
            let notified = self.outstanding.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let remaining = self.outstanding_count();
            if remaining == 0 {
                debug!("All jobs drained");
                return;
            }
            debug!("Waiting for {} outstanding jobs", remaining);

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(policy.poll_interval) => {}
            }
        }
    }
}
